use erdtext::migrate::diff_schemas;
use erdtext::parser;
use erdtext::query::{generate_query, Column};
use erdtext::serializer::schema_to_text;
use erdtext::sql::{parse_sql, Dialect};
use std::env;
use std::fs;
use std::io::Read;
use std::process;

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        process::exit(1);
    }

    match args[1].as_str() {
        "format" => format_command(args.get(2)),
        "query" => query_command(&args[2..]),
        "diff" => diff_command(&args[2..]),
        "import" => import_command(&args[2..]),
        command => {
            eprintln!("Unknown command: {}", command);
            usage(&args[0]);
            process::exit(1);
        }
    }
}

fn usage(program: &str) {
    eprintln!("Usage: {} <command> [options]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  format [file]                  Reformat ERD text (stdin if no file)");
    eprintln!("  query <file> <table.field>...  Build a join query for the requested columns");
    eprintln!("  diff <existing> <desired>      Plan the migration between two ERD files");
    eprintln!("  import [file]                  Convert a SQL dump to ERD text");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -d, --dialect <name>  SQL dialect for import: auto, sqlite, postgres, mysql");
}

fn format_command(path: Option<&String>) {
    let input = read_input(path);
    let schema = parser::parse(&input).unwrap_or_else(|e| {
        eprintln!("Parse error: {}", e);
        process::exit(1);
    });
    print!("{}", schema_to_text(&schema));
}

fn query_command(args: &[String]) {
    let Some(path) = args.first() else {
        eprintln!("Usage: erdtext query <file> <table.field>...");
        process::exit(1);
    };
    let input = read_input(Some(path));
    let schema = parser::parse(&input).unwrap_or_else(|e| {
        eprintln!("Parse error: {}", e);
        process::exit(1);
    });

    let mut columns = Vec::new();
    for request in &args[1..] {
        match request.split_once('.') {
            Some((table, field)) if !table.is_empty() && !field.is_empty() => {
                columns.push(Column {
                    table: table.to_string(),
                    field: field.to_string(),
                });
            }
            _ => {
                eprintln!("Invalid column request: {}", request);
                process::exit(1);
            }
        }
    }

    let select = generate_query(&columns, &schema.tables).unwrap_or_else(|e| {
        eprintln!("Query error: {}", e);
        process::exit(1);
    });
    println!("{}", select.to_sql());
}

fn diff_command(args: &[String]) {
    let (Some(existing_path), Some(desired_path)) = (args.first(), args.get(1)) else {
        eprintln!("Usage: erdtext diff <existing> <desired>");
        process::exit(1);
    };
    let existing = parser::parse(&read_input(Some(existing_path))).unwrap_or_else(|e| {
        eprintln!("Parse error in {}: {}", existing_path, e);
        process::exit(1);
    });
    let desired = parser::parse(&read_input(Some(desired_path))).unwrap_or_else(|e| {
        eprintln!("Parse error in {}: {}", desired_path, e);
        process::exit(1);
    });
    print!("{}", diff_schemas(&existing.tables, &desired.tables).to_text());
}

fn import_command(args: &[String]) {
    let mut dialect = Dialect::Auto;
    let mut path: Option<&String> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--dialect" => {
                i += 1;
                let Some(name) = args.get(i) else {
                    eprintln!("Missing dialect name");
                    process::exit(1);
                };
                dialect = Dialect::from_str(name).unwrap_or_else(|| {
                    eprintln!("Invalid dialect: {}", name);
                    process::exit(1);
                });
            }
            _ => path = Some(&args[i]),
        }
        i += 1;
    }

    let input = read_input(path);
    let schema = parse_sql(&input, dialect).unwrap_or_else(|e| {
        eprintln!("SQL parse error: {}", e);
        process::exit(1);
    });
    print!("{}", schema_to_text(&schema));
}

fn read_input(path: Option<&String>) -> String {
    match path {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Failed to read {}: {}", path, e);
            process::exit(1);
        }),
        None => {
            let mut buffer = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
                eprintln!("Failed to read stdin: {}", e);
                process::exit(1);
            }
            buffer
        }
    }
}
