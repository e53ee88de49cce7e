//! Generate a small two-operation milling program and print it.
//!
//! Run with `cargo run --example basic_post`.

use anyhow::Result;
use rrfpost_core::{Command, Operation, OperationKind, ToolDescriptor, ToolShape};
use rrfpost_post::Post;
use rrfpost_settings::PostSettings;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let tool = ToolDescriptor::new(1, "6mm End Mill", ToolShape::Flat, 2, 3.0, 50.0, 20.0);

    let job = vec![
        Operation::new("Fixture", OperationKind::Fixture).with_command(Command::g(54.0)),
        Operation::new("T1", OperationKind::ToolController(tool))
            .with_command(Command::m(6.0).with("T", 1.0))
            .with_command(Command::m(3.0).with("S", 12000.0)),
        Operation::milling("Outside Profile")
            .with_command(Command::g(0.0).with("Z", 10.0))
            .with_command(Command::g(0.0).with("X", 0.0).with("Y", 0.0))
            .with_command(Command::g(1.0).with("Z", -1.0).with("F", 300.0))
            .with_command(Command::g(1.0).with("X", 50.0).with("F", 900.0))
            .with_command(Command::g(1.0).with("Y", 30.0).with("F", 900.0))
            .with_command(Command::g(0.0).with("Z", 10.0)),
    ];

    let mut post = Post::new(PostSettings::default());
    post.process(&job)?;
    println!("{}", post.finish()?);
    Ok(())
}
