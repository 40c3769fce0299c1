// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `clientserver-tool`: inspect and convert clientserver streams.
//!
//! ```text
//! clientserver-tool to-text session.bin
//! clientserver-tool from-text session.txt -o session.bin --big-endian
//! clientserver-tool demo --log
//! ```

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use clientserver_interpreter::{
    DispatchError, Interpreter, command_function, new_instance_function,
};
use clientserver_stream::{ByteOrder, Command, Id, Object, Stream};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "clientserver-tool", version, about)]
struct Cli {
    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Tool,
}

#[derive(Debug, Subcommand)]
enum Tool {
    /// Decode a binary stream and print its text form.
    ToText {
        /// Binary stream file.
        input: PathBuf,
    },
    /// Parse a text stream and write its binary form.
    FromText {
        /// Text stream file.
        input: PathBuf,
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
        /// Encode most significant byte first instead of in native order.
        #[arg(long)]
        big_endian: bool,
    },
    /// Run a short widget session through an interpreter.
    Demo {
        /// Write the interpreter's message transcript to stderr.
        #[arg(long)]
        log: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Tool::ToText { input } => to_text(&input),
        Tool::FromText {
            input,
            output,
            big_endian,
        } => from_text(&input, &output, big_endian),
        Tool::Demo { log } => demo(log),
    }
}

fn to_text(input: &Path) -> Result<()> {
    let file = fs::File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let stream = Stream::read_from(io::BufReader::new(file))
        .with_context(|| format!("decoding {}", input.display()))?;
    print!("{stream}");
    Ok(())
}

fn from_text(input: &Path, output: &Path, big_endian: bool) -> Result<()> {
    let text =
        fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let stream: Stream = text
        .parse()
        .with_context(|| format!("parsing {}", input.display()))?;
    let order = if big_endian {
        ByteOrder::Big
    } else {
        ByteOrder::NATIVE
    };
    let bytes = stream.data_with_order(order);
    fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(
        messages = stream.message_count(),
        bytes = bytes.len(),
        "wrote {}",
        output.display()
    );
    Ok(())
}

#[derive(Debug, Default)]
struct Widget {
    value: Cell<i64>,
}

impl Object for Widget {
    fn class_name(&self) -> &str {
        "Widget"
    }
}

fn widget_interpreter() -> Result<Interpreter> {
    let mut interp = Interpreter::new();
    interp.add_new_instance_function(
        "Widget",
        new_instance_function(|| Rc::new(Widget::default())),
    )?;
    interp.add_command_function(
        "Widget",
        command_function(|call| {
            let widget = call
                .target::<Widget>()
                .ok_or_else(|| DispatchError::Failed("not a Widget".into()))?;
            match call.method() {
                "SetValue" => {
                    call.expect_arg_count(1)?;
                    widget.value.set(call.arg(0)?);
                }
                "GetValue" => {
                    let value = widget.value.get();
                    call.reply(value);
                }
                _ => return Err(DispatchError::UnknownMethod),
            }
            Ok(())
        }),
    )?;
    Ok(interp)
}

fn demo(log: bool) -> Result<()> {
    let mut interp = widget_interpreter()?;
    if log {
        interp.set_log_writer(Some(Box::new(io::stderr())));
    }

    let mut new = Stream::new();
    new.begin(Command::New).arg("Widget").arg(Id(1)).end();
    let mut set = Stream::new();
    set.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(42_i32).end();
    let mut get = Stream::new();
    get.begin(Command::Invoke).arg(Id(1)).arg("GetValue").end();
    let mut delete = Stream::new();
    delete.begin(Command::Delete).arg(Id(1)).end();
    let mut stale = Stream::new();
    stale.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(1_i32).end();
    let steps = [new, set, get, delete, stale];

    for s in &steps {
        print!("{s}");
        match interp.process_stream(s) {
            Ok(()) => println!("=> ok"),
            Err(e) => println!("=> failed: {e}"),
        }
        print!("{}", interp.last_result());
        println!();
    }
    Ok(())
}
