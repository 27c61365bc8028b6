use piece_table::{BuilderConfig, PieceTableBuilder};

fn main() {
    println!("=== PieceTable Basic Usage Example ===\n");

    println!("1. Creating a PieceTable via the builder:");
    let mut builder = PieceTableBuilder::new();
    builder
        .receive("Hello, World!\nThis is line 2.\nAnd this is line 3.")
        .unwrap();
    builder.build().unwrap();
    let mut table = builder.create(BuilderConfig::default()).unwrap();

    println!("   Total lines: {}", table.line_count());
    println!("   Total length: {} bytes", table.buffer_length());

    println!("\n2. Getting line content:");
    for i in 0..table.line_count() {
        match table.get_line(i) {
            Ok(content) => println!("   Line {i}: '{content}'"),
            Err(e) => println!("   Error getting line {i}: {e}"),
        }
    }

    println!("\n3. Using the builder with several chunks:");
    let mut chunked = PieceTableBuilder::new();
    chunked.receive("First chunk").unwrap();
    chunked.receive("\n").unwrap();
    chunked.receive("Second chunk").unwrap();
    chunked.receive("\n").unwrap();
    chunked.receive("Third chunk").unwrap();
    chunked.build().unwrap();
    let chunked_table = chunked.create(BuilderConfig::default()).unwrap();
    println!("   Built content: '{}'", chunked_table.get_content());
    println!("   Built lines: {}", chunked_table.line_count());

    println!("\n4. Position and offset conversions:");
    let offset = table.offset_at(1, 5).unwrap();
    println!("   Line 1, column 5 -> offset {offset}");
    let pos = table.position_at(offset);
    println!("   offset {offset} -> line {}, column {}", pos.line, pos.column);

    println!("\n5. Getting text in range:");
    let text = table.get_text_in_range(0, 5).unwrap();
    println!("   Text in [0, 5): '{text}'");

    println!("\n6. Line lengths:");
    for i in 0..table.line_count() {
        match table.get_line_length(i) {
            Ok(length) => println!("   Line {i} length: {length} bytes"),
            Err(e) => println!("   Error getting line {i} length: {e}"),
        }
    }

    println!("\n7. Mutating the document:");
    table.insert_at(13, " Inserted!").unwrap();
    println!("   After insert: '{}'", table.get_content());
    table.delete_at(13, 10).unwrap();
    println!("   After delete: '{}'", table.get_content());

    println!("\n8. UTF-8 support:");
    let mut utf8_builder = PieceTableBuilder::new();
    utf8_builder
        .receive("Hello \u{4e16}\u{754c}\n\u{3053}\u{3093}\u{306b}\u{3061}\u{306f}\n\u{1f980} Rust")
        .unwrap();
    utf8_builder.build().unwrap();
    let utf8_table = utf8_builder.create(BuilderConfig::default()).unwrap();
    println!("   UTF-8 content: '{}'", utf8_table.get_content());
    println!("   UTF-8 lines: {}", utf8_table.line_count());

    println!("\n=== Example completed ===");
}
