/// Shape of a composite type, used by text backends to pick markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaType {
    /// Plain record with named members.
    Uninteresting,
    Primitive,
    /// Ordered run of elements.
    Sequential,
    /// Map with unique keys.
    AssociativeUnique,
    /// Map allowing duplicate keys.
    AssociativeMulti,
    Pair,
    /// Wrapper that renders as its single member.
    Transparent,
}

impl MetaType {
    /// Whether members render as an anonymous list.
    pub const fn is_listlike(self) -> bool {
        matches!(
            self,
            MetaType::Sequential | MetaType::AssociativeUnique | MetaType::AssociativeMulti
        )
    }
}

const SEQUENTIAL: &[&str] = &[
    "Vec",
    "VecDeque",
    "LinkedList",
    "BTreeSet",
    "HashSet",
    "BinaryHeap",
];
const ASSOCIATIVE_UNIQUE: &[&str] = &["BTreeMap", "HashMap"];
const ASSOCIATIVE_MULTI: &[&str] = &["MultiMap"];
const TRANSPARENT: &[&str] = &["String", "str", "Box", "Cow"];
const PRIMITIVE: &[&str] = &[
    "bool", "u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64", "u128", "i128", "usize",
    "isize", "f32", "f64", "char",
];

/// Classify a type by its name as produced by [`core::any::type_name`].
///
/// Only the outermost type constructor matters:
/// `alloc::vec::Vec<std::collections::HashMap<u8, u8>>` is
/// [`MetaType::Sequential`].
pub fn meta_type(type_name: &str) -> MetaType {
    let name = type_name.trim();
    if name.starts_with('[') {
        return MetaType::Sequential;
    }
    if name.starts_with('(') {
        return MetaType::Pair;
    }
    let head = base_name(name);
    if SEQUENTIAL.contains(&head) {
        MetaType::Sequential
    } else if ASSOCIATIVE_UNIQUE.contains(&head) {
        MetaType::AssociativeUnique
    } else if ASSOCIATIVE_MULTI.contains(&head) {
        MetaType::AssociativeMulti
    } else if TRANSPARENT.contains(&head) {
        MetaType::Transparent
    } else if PRIMITIVE.contains(&head) {
        MetaType::Primitive
    } else {
        MetaType::Uninteresting
    }
}

/// The last path segment of the outermost type constructor.
fn base_name(name: &str) -> &str {
    let constructor = name.split('<').next().unwrap_or(name);
    constructor.rsplit("::").next().unwrap_or(constructor)
}

/// `type_name` with every module path stripped:
/// `alloc::rc::Rc<app::Node>` becomes `Rc<Node>`.
pub fn short_type_name(type_name: &str) -> String {
    let mut out = String::with_capacity(type_name.len());
    let mut segment = String::new();
    for c in type_name.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            segment.push(c);
        } else {
            out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
            segment.clear();
            out.push(c);
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    out
}
