//! Sample content streams for testing and demonstration.
//!
//! Each sample exercises a different packing path.

use crate::content::{Block, ContentStream, InlineRun, Role};

const BUFREAD_DOCS: &str = "https://doc.rust-lang.org/std/io/trait.BufRead.html";

/// A short chat with styled text, citations, a code answer and a table.
pub fn chat_transcript() -> ContentStream {
    let mut stream = ContentStream::new();
    stream
        .push_opaque("<h1>Conversation export</h1><p>Exported transcript</p>")
        .push_message(
            Role::User,
            vec![Block::text(
                "How do I read a file line by line in Rust, and what does it cost?",
            )],
        )
        .push_message(
            Role::Assistant,
            vec![
                Block::paragraph(vec![
                    InlineRun::plain("Wrap the file in a "),
                    InlineRun::bold("BufReader"),
                    InlineRun::plain(" and iterate over "),
                    InlineRun::italic("lines()"),
                    InlineRun::plain("."),
                    InlineRun::citation("std-io", BUFREAD_DOCS),
                    InlineRun::plain(" Each line is a fresh allocation."),
                ]),
                Block::code(
                    "use std::fs::File;\n\
                     use std::io::{self, BufRead, BufReader};\n\
                     \n\
                     fn main() -> io::Result<()> {\n    \
                         let file = File::open(\"input.txt\")?;\n    \
                         for line in BufReader::new(file).lines() {\n        \
                             println!(\"{}\", line?);\n    \
                         }\n    \
                         Ok(())\n\
                     }\n",
                ),
                Block::table(vec![
                    vec![
                        vec![InlineRun::plain("Approach")],
                        vec![InlineRun::plain("Allocation")],
                    ],
                    vec![
                        vec![InlineRun::plain("lines()")],
                        vec![InlineRun::plain("one String per line")],
                    ],
                    vec![
                        vec![InlineRun::plain("read_line")],
                        vec![
                            InlineRun::plain("reused buffer"),
                            InlineRun::citation("std-io", BUFREAD_DOCS),
                        ],
                    ],
                ]),
            ],
        )
        .push_message(Role::User, vec![Block::text("Thanks!")]);
    stream
}

/// A single assistant message holding one table with `rows` body rows.
pub fn long_table(rows: usize) -> ContentStream {
    let header = vec![
        vec![InlineRun::plain("#")],
        vec![InlineRun::plain("Item")],
        vec![InlineRun::plain("Status")],
    ];
    let body = (1..=rows).map(|i| {
        vec![
            vec![InlineRun::plain(i.to_string())],
            vec![InlineRun::plain(format!("Work item {i}"))],
            vec![InlineRun::plain(if i % 3 == 0 { "done" } else { "open" })],
        ]
    });
    let table = Block::table(std::iter::once(header).chain(body).collect());

    let mut stream = ContentStream::new();
    stream.push_message(Role::Assistant, vec![table]);
    stream
}

/// A note (single label-less message) with long prose and citations.
pub fn research_note() -> ContentStream {
    let sentence = "Pagination splits each block at its natural atoms so that no page \
                    overflows and no content is lost or reordered.";
    let mut blocks = Vec::new();
    for i in 0..12 {
        blocks.push(Block::paragraph(vec![
            InlineRun::plain(format!("{i}. {sentence} {sentence}")),
            InlineRun::citation(
                format!("src{}", i % 4),
                format!("https://example.org/paper/{}", i % 4),
            ),
        ]));
    }
    blocks.push(Block::code(
        (1..=60)
            .map(|n| format!("step {n:02}: measure, split, place"))
            .collect::<Vec<_>>()
            .join("\n"),
    ));
    ContentStream::from_note(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::collect;

    #[test]
    fn samples_round_trip_through_json() {
        for stream in [chat_transcript(), long_table(5), research_note()] {
            let json = stream.to_json().unwrap();
            assert_eq!(ContentStream::from_json(&json).unwrap(), stream);
        }
    }

    #[test]
    fn sample_references() {
        assert_eq!(collect(&chat_transcript()).len(), 1);
        assert_eq!(collect(&research_note()).len(), 4);
        assert!(collect(&long_table(3)).is_empty());
    }

    #[test]
    fn long_table_shape() {
        let stream = long_table(50);
        let message = stream.messages().next().unwrap();
        match &message.chunks[0] {
            Block::Table { rows } => assert_eq!(rows.len(), 51),
            other => panic!("expected table, got {}", other.kind()),
        }
    }
}
