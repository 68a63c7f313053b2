//! Send a small graph with a shared node over a socket pair and show the
//! human-readable and JSON renderings of the same value.
use {
    graphwire::{
        channel::{BinaryChannel, Direction},
        recv_object, send_object,
        stream::{BufferedStream, FdTransport},
        to_json, to_readable, Serialize,
    },
    std::{os::unix::net::UnixStream, rc::Rc},
};

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
struct Node {
    id: u32,
    name: String,
    tags: Vec<String>,
    parent: Option<Rc<Node>>,
}

fn main() -> graphwire::Result<()> {
    let root = Rc::new(Node {
        id: 7,
        name: "abc".into(),
        tags: vec!["x".into(), "y".into()],
        parent: None,
    });
    let mut children: Vec<Node> = (1..=3)
        .map(|id| Node {
            id,
            name: format!("child-{id}"),
            parent: Some(root.clone()),
            ..Default::default()
        })
        .collect();

    print!("{}", to_readable(&mut children)?);
    print!("{}", to_json(&mut children)?);

    let (left, right) = UnixStream::pair().map_err(|e| graphwire::error::transport_fault("pair", e))?;
    let mut writer = BufferedStream::new(FdTransport::new(left)?);
    let mut reader = BufferedStream::new(FdTransport::new(right)?);

    send_object(&mut BinaryChannel::new(&mut writer, Direction::Out), &mut children)?;
    println!("sent {} bytes", writer.bytes_written());

    let mut received: Vec<Node> = Vec::new();
    recv_object(&mut BinaryChannel::new(&mut reader, Direction::In), &mut received)?;
    let shared = received
        .windows(2)
        .all(|pair| match (&pair[0].parent, &pair[1].parent) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        });
    println!("received {} nodes, parent shared: {shared}", received.len());
    Ok(())
}
