use std::time::Instant;

use piece_table::{BuilderConfig, PieceTableBuilder};

fn main() {
    println!("=== PieceTable Performance Demo ===\n");

    println!("1. Building a large document from chunks:");
    let start = Instant::now();
    let mut builder = PieceTableBuilder::new();
    for i in 0..1000 {
        builder
            .receive(&format!("This is line {i} with some content.\n"))
            .unwrap();
    }
    builder.build().unwrap();
    let large_table = builder.create(BuilderConfig::default()).unwrap();
    let build_time = start.elapsed();

    println!(
        "   Built document with {} lines in {:?}",
        large_table.line_count(),
        build_time
    );
    println!("   Total length: {} bytes", large_table.buffer_length());

    println!("\n2. Random line access performance:");
    let start = Instant::now();
    let mut total_bytes = 0;
    for i in (0..100).map(|x| (x * 7) % large_table.line_count()) {
        if let Ok(content) = large_table.get_line(i) {
            total_bytes += content.len();
        }
    }
    let access_time = start.elapsed();
    println!("   Accessed 100 random lines in {access_time:?}");
    println!("   Total bytes read: {total_bytes}");

    println!("\n3. Sequential line access performance:");
    let start = Instant::now();
    let mut line_count = 0;
    for i in 0..large_table.line_count() {
        if large_table.get_line(i).is_ok() {
            line_count += 1;
        }
    }
    let sequential_time = start.elapsed();
    println!("   Accessed {line_count} lines sequentially in {sequential_time:?}");

    println!("\n4. Position conversion performance:");
    let start = Instant::now();
    let mut successful_conversions = 0;
    for line in (0..100).map(|x| x * 10) {
        for col in 0..10 {
            let line = line % large_table.line_count();
            if let Ok(offset) = large_table.offset_at(line, col) {
                let _ = large_table.position_at(offset);
                successful_conversions += 1;
            }
        }
    }
    let conversion_time = start.elapsed();
    println!("   Performed {successful_conversions} position conversions in {conversion_time:?}");

    println!("\n5. Many small inserts (append-only added buffer):");
    let start = Instant::now();
    let mut mutable = PieceTableBuilder::new();
    mutable.receive("base text\n").unwrap();
    mutable.build().unwrap();
    let mut mutable_table = mutable.create(BuilderConfig::default()).unwrap();
    for i in 0..500 {
        let offset = mutable_table.buffer_length();
        mutable_table
            .insert_at(offset, &format!("appended {i}\n"))
            .unwrap();
    }
    let insert_time = start.elapsed();
    println!(
        "   Performed 500 inserts, final length {} bytes, in {:?}",
        mutable_table.buffer_length(),
        insert_time
    );

    println!("\n6. Repeated-content document (piece reuse, not byte duplication):");
    let mut efficient_builder = PieceTableBuilder::new();
    let repeated_content = "This line is repeated many times to demonstrate efficiency.\n";
    for _ in 0..100 {
        efficient_builder.receive(repeated_content).unwrap();
    }
    efficient_builder.build().unwrap();
    let efficient_table = efficient_builder.create(BuilderConfig::default()).unwrap();
    println!(
        "   Created document with {} lines of repeated content",
        efficient_table.line_count()
    );
    println!("   Total length: {} bytes", efficient_table.buffer_length());

    println!("\n7. UTF-8 handling performance:");
    let utf8_content = "Hello \u{4e16}\u{754c}! \u{1f980} Rust is awesome! \u{3053}\u{3093}\u{306b}\u{3061}\u{306f}\n";
    let mut utf8_builder = PieceTableBuilder::new();
    let start = Instant::now();
    for _ in 0..100 {
        utf8_builder.receive(utf8_content).unwrap();
    }
    utf8_builder.build().unwrap();
    let utf8_table = utf8_builder.create(BuilderConfig::default()).unwrap();
    let utf8_build_time = start.elapsed();
    println!(
        "   Built UTF-8 document with {} lines in {:?}",
        utf8_table.line_count(),
        utf8_build_time
    );

    let start = Instant::now();
    let mut utf8_byte_count = 0;
    for i in 0..utf8_table.line_count() {
        if let Ok(length) = utf8_table.get_line_length(i) {
            utf8_byte_count += length;
        }
    }
    let utf8_access_time = start.elapsed();
    println!("   Counted {utf8_byte_count} UTF-8 bytes in {utf8_access_time:?}");

    println!("\n=== Performance Demo Completed ===");
    println!("\nKey observations:");
    println!("- Building large documents from chunks is efficient due to the append-only added buffer");
    println!("- Random line access stays fast thanks to the tree's length/line-feed aggregates");
    println!("- Position conversions need no full scan, only an O(tree height) descent");
    println!("- UTF-8 content is handled as plain byte offsets throughout");
}
