//! Converts a Concise Encoding file between its binary and text forms.
//!
//! Text input (starting with `c`) is written out as CBE hex, binary input as
//! CTE text, followed by a short summary of the document.

use std::fs;

use concise_encoding::{Document, Event, Node, decode_cbe, decode_cte, encode_cbe, encode_cte};

fn summarize(events: &[Event]) {
    let mut containers = 0usize;
    let mut scalars = 0usize;
    let mut markers = 0usize;
    let mut references = 0usize;
    for event in events {
        match event {
            Event::ListBegin | Event::MapBegin | Event::MarkupBegin => containers += 1,
            Event::Marker(_) => markers += 1,
            Event::Reference(_) => references += 1,
            Event::BeginDocument
            | Event::EndDocument
            | Event::Version(_)
            | Event::Padding(_)
            | Event::End
            | Event::MetadataBegin
            | Event::CommentBegin => {}
            _ => scalars += 1,
        }
    }
    println!("Events: {}", events.len());
    println!("Containers: {}", containers);
    println!("Scalars: {}", scalars);
    println!("Markers: {} ({} references)", markers, references);

    match Document::from_events(events) {
        Ok(doc) => {
            let root = match doc.node(doc.root()) {
                Some(Node::List(items)) => format!("list of {}", items.len()),
                Some(Node::Map(pairs)) => format!("map of {}", pairs.len()),
                Some(Node::Markup { name, .. }) => format!("markup <{}>", name),
                Some(Node::Scalar(event)) => event.name().to_string(),
                Some(Node::Reference(_)) => "reference".to_string(),
                None => "empty".to_string(),
            };
            println!("Root: {} ({} nodes)", root, doc.len());
        }
        Err(e) => println!("Resolve failed: {}", e),
    }
}

fn main() {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: decode_file <file.cbe|file.cte>");
        std::process::exit(2);
    };

    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };
    println!("File: {} ({} bytes)", path, data.len());

    let is_text = matches!(data.first(), Some(b'c' | b'C'));
    let decoded = if is_text { decode_cte(&data) } else { decode_cbe(&data) };
    let events = match decoded {
        Ok(events) => events,
        Err(e) => {
            eprintln!("Decode failed: {}", e);
            std::process::exit(1);
        }
    };

    if is_text {
        match encode_cbe(&events) {
            Ok(bytes) => {
                let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                println!("\n{}\n", hex.join(" "));
            }
            Err(e) => eprintln!("Encode failed: {}", e),
        }
    } else {
        match encode_cte(&events) {
            Ok(text) => println!("\n{}\n", text),
            Err(e) => eprintln!("Encode failed: {}", e),
        }
    }

    summarize(&events);
}
