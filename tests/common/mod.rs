//! A small classfile assembler for tests: builds valid `CAFEBABE` byte
//! buffers the way `javac` lays them out, so the decompiler can be driven
//! without a Java toolchain.

#![allow(dead_code)]

/// Serializes one classfile. Pool indices are handed back by the `pool_*`
/// methods; duplicates are not interned because the parser does not care.
#[derive(Default)]
pub struct ClassBuilder {
    pool: Vec<u8>,
    pool_slots: u16,
    fields: Vec<u8>,
    field_count: u16,
    methods: Vec<u8>,
    method_count: u16,
    attributes: Vec<u8>,
    attribute_count: u16,
    bootstrap: Vec<u8>,
    bootstrap_count: u16,
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

impl ClassBuilder {
    pub fn new() -> Self {
        Self {
            pool_slots: 1,
            ..Self::default()
        }
    }

    fn push_entry(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.pool_slots;
        self.pool.extend_from_slice(bytes);
        self.pool_slots += slots;
        index
    }

    pub fn pool_utf8(&mut self, text: &str) -> u16 {
        self.pool_utf8_bytes(text.as_bytes())
    }

    pub fn pool_utf8_bytes(&mut self, bytes: &[u8]) -> u16 {
        let mut entry = vec![1];
        push_u16(&mut entry, bytes.len() as u16);
        entry.extend_from_slice(bytes);
        self.push_entry(&entry, 1)
    }

    pub fn pool_integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        push_u32(&mut entry, value as u32);
        self.push_entry(&entry, 1)
    }

    pub fn pool_long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.push_entry(&entry, 2)
    }

    pub fn pool_class(&mut self, name: &str) -> u16 {
        let utf8 = self.pool_utf8(name);
        let mut entry = vec![7];
        push_u16(&mut entry, utf8);
        self.push_entry(&entry, 1)
    }

    pub fn pool_string(&mut self, text: &str) -> u16 {
        let utf8 = self.pool_utf8(text);
        let mut entry = vec![8];
        push_u16(&mut entry, utf8);
        self.push_entry(&entry, 1)
    }

    pub fn pool_string_bytes(&mut self, bytes: &[u8]) -> u16 {
        let utf8 = self.pool_utf8_bytes(bytes);
        let mut entry = vec![8];
        push_u16(&mut entry, utf8);
        self.push_entry(&entry, 1)
    }

    pub fn pool_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.pool_utf8(name);
        let descriptor = self.pool_utf8(descriptor);
        let mut entry = vec![12];
        push_u16(&mut entry, name);
        push_u16(&mut entry, descriptor);
        self.push_entry(&entry, 1)
    }

    pub fn pool_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.pool_class(class);
        let nat = self.pool_name_and_type(name, descriptor);
        let mut entry = vec![9];
        push_u16(&mut entry, class);
        push_u16(&mut entry, nat);
        self.push_entry(&entry, 1)
    }

    pub fn pool_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.pool_class(class);
        let nat = self.pool_name_and_type(name, descriptor);
        let mut entry = vec![10];
        push_u16(&mut entry, class);
        push_u16(&mut entry, nat);
        self.push_entry(&entry, 1)
    }

    pub fn pool_method_handle(&mut self, kind: u8, reference: u16) -> u16 {
        let mut entry = vec![15, kind];
        push_u16(&mut entry, reference);
        self.push_entry(&entry, 1)
    }

    pub fn pool_invoke_dynamic(&mut self, bootstrap: u16, name: &str, descriptor: &str) -> u16 {
        let nat = self.pool_name_and_type(name, descriptor);
        let mut entry = vec![18];
        push_u16(&mut entry, bootstrap);
        push_u16(&mut entry, nat);
        self.push_entry(&entry, 1)
    }

    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name = self.pool_utf8(name);
        let descriptor = self.pool_utf8(descriptor);
        push_u16(&mut self.fields, flags);
        push_u16(&mut self.fields, name);
        push_u16(&mut self.fields, descriptor);
        push_u16(&mut self.fields, 0);
        self.field_count += 1;
    }

    /// A field annotated `@unsigned` (`Ltypes/unsigned;`).
    pub fn unsigned_field(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name = self.pool_utf8(name);
        let descriptor = self.pool_utf8(descriptor);
        let attr_name = self.pool_utf8("RuntimeInvisibleAnnotations");
        let marker = self.pool_utf8("Ltypes/unsigned;");

        let mut info = Vec::new();
        push_u16(&mut info, 1); // one annotation
        push_u16(&mut info, marker);
        push_u16(&mut info, 0); // no element pairs

        push_u16(&mut self.fields, flags);
        push_u16(&mut self.fields, name);
        push_u16(&mut self.fields, descriptor);
        push_u16(&mut self.fields, 1);
        push_u16(&mut self.fields, attr_name);
        push_u32(&mut self.fields, info.len() as u32);
        self.fields.extend_from_slice(&info);
        self.field_count += 1;
    }

    /// A method with a `Code` attribute holding `code` and the given
    /// `(start_pc, line)` table.
    pub fn method(&mut self, flags: u16, name: &str, descriptor: &str, code: &[u8], lines: &[(u16, u16)]) {
        let name = self.pool_utf8(name);
        let descriptor = self.pool_utf8(descriptor);
        let code_attr = self.pool_utf8("Code");
        let lnt_attr = self.pool_utf8("LineNumberTable");

        let mut lnt = Vec::new();
        push_u16(&mut lnt, lines.len() as u16);
        for &(start_pc, line) in lines {
            push_u16(&mut lnt, start_pc);
            push_u16(&mut lnt, line);
        }

        let mut info = Vec::new();
        push_u16(&mut info, 8); // max_stack
        push_u16(&mut info, 8); // max_locals
        push_u32(&mut info, code.len() as u32);
        info.extend_from_slice(code);
        push_u16(&mut info, 0); // exception table
        push_u16(&mut info, 1); // one attribute
        push_u16(&mut info, lnt_attr);
        push_u32(&mut info, lnt.len() as u32);
        info.extend_from_slice(&lnt);

        push_u16(&mut self.methods, flags);
        push_u16(&mut self.methods, name);
        push_u16(&mut self.methods, descriptor);
        push_u16(&mut self.methods, 1);
        push_u16(&mut self.methods, code_attr);
        push_u32(&mut self.methods, info.len() as u32);
        self.methods.extend_from_slice(&info);
        self.method_count += 1;
    }

    /// Attaches `@Board(Type.<constant>)` to the class.
    pub fn board(&mut self, constant: &str) {
        let attr_name = self.pool_utf8("RuntimeInvisibleAnnotations");
        let annotation = self.pool_utf8("Lboard/Board;");
        let element = self.pool_utf8("value");
        let enum_type = self.pool_utf8("Lboard/Type;");
        let enum_const = self.pool_utf8(constant);

        let mut info = Vec::new();
        push_u16(&mut info, 1); // one annotation
        push_u16(&mut info, annotation);
        push_u16(&mut info, 1); // one element pair
        push_u16(&mut info, element);
        info.push(b'e');
        push_u16(&mut info, enum_type);
        push_u16(&mut info, enum_const);

        push_u16(&mut self.attributes, attr_name);
        push_u32(&mut self.attributes, info.len() as u32);
        self.attributes.extend_from_slice(&info);
        self.attribute_count += 1;
    }

    /// Registers a `makeConcatWithConstants` bootstrap method whose recipe
    /// may contain `0x01` argument markers. Returns the bootstrap index
    /// for `pool_invoke_dynamic`.
    pub fn bootstrap_concat(&mut self, recipe: &[u8]) -> u16 {
        let method_ref = self.pool_method_ref(
            "java/lang/invoke/StringConcatFactory",
            "makeConcatWithConstants",
            "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
        );
        let handle = self.pool_method_handle(6, method_ref);
        let recipe = self.pool_string_bytes(recipe);

        let index = self.bootstrap_count;
        push_u16(&mut self.bootstrap, handle);
        push_u16(&mut self.bootstrap, 1);
        push_u16(&mut self.bootstrap, recipe);
        self.bootstrap_count += 1;
        index
    }

    pub fn build(mut self) -> Vec<u8> {
        let bootstrap_attr = if self.bootstrap_count > 0 {
            Some(self.pool_utf8("BootstrapMethods"))
        } else {
            None
        };

        let mut out = Vec::new();
        push_u32(&mut out, 0xCAFEBABE);
        push_u16(&mut out, 0); // minor
        push_u16(&mut out, 61); // major
        push_u16(&mut out, self.pool_slots);
        out.extend_from_slice(&self.pool);

        push_u16(&mut out, 0x0021); // ACC_PUBLIC | ACC_SUPER
        push_u16(&mut out, 0); // this_class (unused by the parser)
        push_u16(&mut out, 0); // super_class
        push_u16(&mut out, 0); // interfaces

        push_u16(&mut out, self.field_count);
        out.extend_from_slice(&self.fields);
        push_u16(&mut out, self.method_count);
        out.extend_from_slice(&self.methods);

        let mut attribute_count = self.attribute_count;
        if bootstrap_attr.is_some() {
            attribute_count += 1;
        }
        push_u16(&mut out, attribute_count);
        out.extend_from_slice(&self.attributes);

        if let Some(name) = bootstrap_attr {
            let mut info = Vec::new();
            push_u16(&mut info, self.bootstrap_count);
            info.extend_from_slice(&self.bootstrap);

            push_u16(&mut out, name);
            push_u32(&mut out, info.len() as u32);
            out.extend_from_slice(&info);
        }

        out
    }
}

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
