use {
    graphwire::{
        channel::{BinaryChannel, Channel, Direction, TextChannel},
        from_bytes, from_text, next_package, recv_object, send_object, serialize_object,
        stream::{BufferedStream, FdTransport, MemoryTransport},
        to_bytes, to_json, to_readable, to_text, Config, Error, ErrorKind, Serialize,
    },
    std::{
        cell::RefCell,
        collections::{BTreeMap, HashMap, VecDeque},
        os::unix::net::UnixStream,
        rc::Rc,
        sync::Arc,
    },
};

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
struct Node {
    id: u32,
    name: String,
    tags: Vec<String>,
    parent: Option<Rc<Node>>,
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Color {
    #[default]
    Red,
    Green,
    Blue,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
enum Shape {
    Circle { radius: f64 },
    Rect(u32, u32),
    #[default]
    Empty,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
#[graphwire(rename = "Canvas")]
struct Drawing {
    #[graphwire(rename = "fill")]
    color: Color,
    shapes: Vec<Shape>,
    #[graphwire(skip)]
    scratch: u32,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
struct Pair(u8, String);

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
struct Wrapper<T> {
    inner: T,
}

fn node(id: u32, parent: Option<Rc<Node>>) -> Node {
    Node {
        id,
        name: format!("n{id}"),
        tags: vec!["x".into(), "y".into()],
        parent,
    }
}

#[test]
fn shared_parent_survives_two_packages() {
    let parent = Rc::new(Node {
        id: 7,
        name: "abc".into(),
        tags: vec!["x".into(), "y".into()],
        parent: None,
    });
    let mut first = node(1, Some(parent.clone()));
    let mut second = node(2, Some(parent));

    let mut stream = BufferedStream::new(MemoryTransport::new());
    {
        let mut out = BinaryChannel::new(&mut stream, Direction::Out);
        send_object(&mut out, &mut first).unwrap();
        send_object(&mut out, &mut second).unwrap();
        assert_eq!(out.state().identities().len(), 1);
    }

    let mut input = BinaryChannel::new(&mut stream, Direction::In);
    let mut a = Node::default();
    let mut b = Node::default();
    recv_object(&mut input, &mut a).unwrap();
    recv_object(&mut input, &mut b).unwrap();
    assert_eq!(a, first);
    assert_eq!(b, second);
    let (pa, pb) = (a.parent.unwrap(), b.parent.unwrap());
    assert!(Rc::ptr_eq(&pa, &pb));
    assert_eq!(pa.id, 7);
    assert_eq!(pa.tags, ["x", "y"]);
}

#[test]
fn separate_channels_do_not_share() {
    let parent = Rc::new(node(7, None));
    let mut first = node(1, Some(parent.clone()));
    let mut second = node(2, Some(parent));
    let a: Node = from_bytes(&to_bytes(&mut first).unwrap()).unwrap();
    let b: Node = from_bytes(&to_bytes(&mut second).unwrap()).unwrap();
    assert!(!Rc::ptr_eq(a.parent.as_ref().unwrap(), b.parent.as_ref().unwrap()));
    assert_eq!(a.parent, b.parent);
}

#[test]
fn null_pointer_reads_back_null() {
    let mut lone = node(3, None);
    let back: Node = from_text(&to_text(&mut lone).unwrap()).unwrap();
    assert_eq!(back, lone);
}

#[test]
fn null_handle_into_existing_target_is_rejected() {
    let bytes = to_bytes(&mut node(3, None)).unwrap();
    let mut stream = BufferedStream::new(MemoryTransport::from(bytes));
    let mut input = BinaryChannel::new(&mut stream, Direction::In);
    let mut target = node(0, Some(Rc::new(Node::default())));
    let err = recv_object(&mut input, &mut target).unwrap_err();
    assert!(matches!(err, Error::NonNullTarget { .. }));
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[derive(Debug, Default, Clone)]
struct Cyclic {
    next: RefCell<Option<Rc<Cyclic>>>,
}

impl Serialize for Cyclic {
    fn type_name() -> &'static str {
        "Cyclic"
    }

    fn serialize<C: Channel + ?Sized>(&mut self, channel: &mut C, label: &str) -> graphwire::Result<()> {
        graphwire::serialize_class(channel, Self::type_name(), label, |channel| {
            self.next.get_mut().serialize(channel, "next")
        })
    }
}

#[test]
fn reference_cycles_are_detected() {
    let head = Rc::new(Cyclic::default());
    *head.next.borrow_mut() = Some(head.clone());
    let mut root = Cyclic {
        next: RefCell::new(Some(head.clone())),
    };
    let err = to_bytes(&mut root).unwrap_err();
    assert!(matches!(err, Error::CycleDetected { handle: 1, .. }));
    head.next.borrow_mut().take();
}

#[test]
fn containers_of_every_kind() {
    let mut value = (
        (
            VecDeque::from([1i64, -2, 3]),
            HashMap::from([(String::from("k"), vec![0.5f32])]),
        ),
        BTreeMap::from([(1u8, Arc::new(String::from("shared")))]),
    );
    let bytes = to_bytes(&mut value).unwrap();
    let back: (
        (VecDeque<i64>, HashMap<String, Vec<f32>>),
        BTreeMap<u8, Arc<String>>,
    ) = from_bytes(&bytes).unwrap();
    assert_eq!(back, value);
}

#[test]
fn derived_enums_and_attributes() {
    let mut drawing = Drawing {
        color: Color::Blue,
        shapes: vec![Shape::Circle { radius: 1.5 }, Shape::Rect(2, 3), Shape::Empty],
        scratch: 99,
    };
    let text = to_text(&mut drawing).unwrap();
    assert!(text.starts_with("package: Canvas\t"), "{text}");
    assert!(text.contains("fill: 2\t"), "{text}");
    assert!(!text.contains("scratch"), "{text}");

    let back: Drawing = from_text(&text).unwrap();
    assert_eq!(back.color, Color::Blue);
    assert_eq!(back.shapes, drawing.shapes);
    assert_eq!(back.scratch, 0);
}

#[test]
fn unknown_enum_tag_is_rejected() {
    let bytes = to_bytes(&mut 7i32).unwrap();
    let mut stream = BufferedStream::new(MemoryTransport::from(bytes));
    let mut input = BinaryChannel::new(&mut stream, Direction::In);
    next_package(&mut input).unwrap();
    let err = serialize_object(&mut input, &mut Color::Red).unwrap_err();
    assert!(matches!(err, Error::InvalidTagEncoding(7)));
}

#[test]
fn tuple_and_generic_structs() {
    let mut pair = Pair(4, "four".into());
    let json = to_json(&mut pair).unwrap();
    assert_eq!(
        json,
        "{\"package\": \"Pair\", \"object\": {\"0\": 4, \"1\": \"four\"}}\n"
    );

    let mut wrapped = Wrapper { inner: 5u16 };
    let bytes = to_bytes(&mut wrapped).unwrap();
    assert_eq!(from_bytes::<Wrapper<u16>>(&bytes).unwrap(), wrapped);
    assert!(matches!(
        from_bytes::<Wrapper<u32>>(&bytes),
        Err(Error::UnexpectedToken { .. })
    ));
}

#[test]
fn readable_rendering_nests() {
    let parent = Rc::new(node(7, None));
    let mut child = node(1, Some(parent));
    let text = to_readable(&mut child).unwrap();
    assert!(text.starts_with("package Node\n"), "{text}");
    assert!(text.contains("\n    id: 1\n"), "{text}");
    assert!(text.contains("tags (Vec<String>) ["), "{text}");
}

#[test]
fn unix_socket_round_trip() {
    let (left, right) = UnixStream::pair().unwrap();
    let config = Config::default();
    let mut writer = BufferedStream::with_config(FdTransport::new(left).unwrap(), &config)
        .with_resource("left");
    let mut reader = BufferedStream::with_config(FdTransport::new(right).unwrap(), &config)
        .with_resource("right");

    let parent = Rc::new(node(9, None));
    let mut nodes = vec![node(1, Some(parent.clone())), node(2, Some(parent))];
    {
        let mut out = TextChannel::new(&mut writer, Direction::Out);
        send_object(&mut out, &mut nodes).unwrap();
    }

    let mut input = TextChannel::new(&mut reader, Direction::In);
    let mut back: Vec<Node> = Vec::new();
    recv_object(&mut input, &mut back).unwrap();
    assert_eq!(back, nodes);
    assert!(Rc::ptr_eq(
        back[0].parent.as_ref().unwrap(),
        back[1].parent.as_ref().unwrap()
    ));
}

#[test]
fn channel_misuse() {
    let mut stream = BufferedStream::new(MemoryTransport::new());
    let mut out = BinaryChannel::new(&mut stream, Direction::Out);
    assert!(matches!(out.close(), Err(Error::AlreadyClosed { .. })));
    out.open(Some("x")).unwrap();
    assert!(matches!(out.open(Some("x")), Err(Error::AlreadyOpen { .. })));
    assert!(matches!(out.open(None), Err(Error::AlreadyOpen { .. })));
}
