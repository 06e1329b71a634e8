//! Open XML documents through the entity manager and dump their decoded text.

use std::{
    io::{Write, stdin, stdout},
    process::ExitCode,
};

use clap::Parser;
use exent::{
    entity::{XmlCharDataSink, XmlEntityManager, XmlEntityOption},
    globals::{get_last_error, reset_last_error, set_default_chunk_size, set_parser_debug_entities},
    io::XmlInputSource,
};

#[derive(clap::Parser, Debug)]
#[command(
    version,
    name = "exentdump",
    about = "Decode XML documents and print their character data.",
    arg_required_else_help = true
)]
struct CmdArgs {
    #[clap(required = true)]
    xml_files: Vec<String>,
    /// decode the files with this encoding instead of detecting it
    #[arg(long, value_name = "NAME")]
    encoding: Option<String>,
    /// the number of characters decoded at once
    #[arg(long, value_name = "N")]
    chunk_size: Option<usize>,
    /// trace entity and reader changes
    #[arg(long)]
    debug_entities: bool,
    /// accept charset names unknown to the built-in table
    #[arg(long)]
    pass_through_encodings: bool,
    /// relax the nesting limit
    #[arg(long)]
    huge: bool,
}

struct StdoutSink<W: Write> {
    out: W,
    failed: bool,
}

impl<W: Write> XmlCharDataSink for StdoutSink<W> {
    fn characters(&mut self, text: &str) {
        if self.out.write_all(text.as_bytes()).is_err() {
            self.failed = true;
        }
    }
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();
    if args.debug_entities {
        set_parser_debug_entities(true);
    }
    if let Some(size) = args.chunk_size.filter(|&size| size > 0) {
        set_default_chunk_size(size);
    }
    let mut options = 0;
    if args.pass_through_encodings {
        options |= XmlEntityOption::AllowPassThroughEncodings as i32;
    }
    if args.huge {
        options |= XmlEntityOption::Huge as i32;
    }

    let mut manager = XmlEntityManager::new(options);
    let mut sink = StdoutSink {
        out: stdout().lock(),
        failed: false,
    };
    let mut status = ExitCode::SUCCESS;
    for file in &args.xml_files {
        manager.reset();
        reset_last_error();
        let mut source = if file == "-" {
            XmlInputSource::from_reader(stdin())
        } else {
            XmlInputSource::new(file.as_str())
        };
        if let Some(encoding) = args.encoding.as_deref() {
            source = source.with_encoding(encoding);
        }
        if !manager.start_reading_from_document(source) {
            status = ExitCode::FAILURE;
            continue;
        }
        while manager.deliver_chunk(&mut sink) {}
        manager.change_readers();
        sink.out.flush().ok();
        if sink.failed || get_last_error().code.is_err() {
            status = ExitCode::FAILURE;
        }
    }
    status
}
