use clap::{Parser, Subcommand};
use pq_reader::binding;
use pq_reader::config::ReaderOptions;
use pq_reader::parquet::ColumnSelection;
use pq_reader::reader::TableReader;
use std::sync::Arc;

#[derive(Parser, Clone)]
#[command(about = "Inspect Parquet files on local disk, HDFS or S3")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Quiet mode - only warnings are logged
    #[arg(short, long, global = true)]
    quiet: bool,

    /// User name sent to WebHDFS (defaults to $HADOOP_USER_NAME)
    #[arg(long, global = true)]
    hdfs_user: Option<String>,

    /// WebHDFS HTTP port for hdfs:// URIs and webhdfs:// URIs without one
    #[arg(long, global = true)]
    webhdfs_port: Option<u16>,

    /// AWS region for s3:// sources (defaults to $AWS_REGION)
    #[arg(short, long, global = true)]
    region: Option<String>,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Print the columns of a file and the type each is read as
    Schema {
        /// Path or URI of the file (local path, file://, hdfs://host:port/path, s3://bucket/key)
        uri: String,
    },

    /// Print row group layout and the partitions a reader would use
    Info {
        uri: String,

        /// Target partition size (e.g., 64MB, 1GB)
        #[arg(short, long, default_value = "64MB")]
        partition_size: String,
    },

    /// Print the first rows of a file
    Head {
        uri: String,

        /// Columns to print (format: a,b,c), all by default
        #[arg(short, long)]
        columns: Option<String>,

        /// First row to print
        #[arg(short, long, default_value = "0")]
        start: u64,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value = "10")]
        rows: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing based on quiet mode
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if args.quiet {
        EnvFilter::new("pq_reader=warn")
    } else {
        EnvFilter::new("pq_reader=info")
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mut options = ReaderOptions::from_env();
    if let Some(user) = args.hdfs_user {
        options.hdfs_user = Some(user);
    }
    if let Some(port) = args.webhdfs_port {
        options.webhdfs_port = port;
    }
    if let Some(region) = args.region {
        options.s3_region = Some(region);
    }

    match args.command {
        Command::Schema { uri } => {
            let reader = binding::open(&uri, options).await?;
            print_schema(reader.as_ref());
        }
        Command::Info {
            uri,
            partition_size,
        } => {
            let partition_size_bytes = cli::parse_size_string(&partition_size).map_err(|e| {
                anyhow::anyhow!("Invalid partition size '{}': {}", partition_size, e)
            })?;
            let reader = binding::open(&uri, options).await?;
            print_info(reader.as_ref(), partition_size_bytes);
        }
        Command::Head {
            uri,
            columns,
            start,
            rows,
        } => {
            let selection = match columns {
                Some(ref list) => cli::parse_columns(list).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to parse column list: {}\n\
                         Example: --columns \"id,name\"",
                        e
                    )
                })?,
                None => ColumnSelection::All,
            };
            let reader = binding::open(&uri, options).await?;
            print_head(reader, &selection, start, rows).await?;
        }
    }
    Ok(())
}

fn print_schema(reader: &dyn TableReader) {
    println!("Source: {}", reader.uri());
    println!("Rows: {}", reader.metadata().num_rows);
    println!();
    println!("{:>4}  {:<24} {:<12} {:<8} Arrow type", "#", "Column", "Read as", "Nullable");
    for (index, field) in reader.schema().fields().iter().enumerate() {
        let read_as = field
            .column_type
            .map_or_else(|| "unsupported".to_string(), |t| t.to_string());
        println!(
            "{:>4}  {:<24} {:<12} {:<8} {}",
            index, field.name, read_as, field.nullable, field.data_type
        );
    }
}

fn print_info(reader: &dyn TableReader, partition_size_bytes: u64) {
    let metadata = reader.metadata();

    println!("Source: {}", reader.uri());
    println!("File size: {} bytes", metadata.file_size_bytes);
    println!("Rows: {}", metadata.num_rows);
    println!("Columns: {}", reader.schema().len());
    println!();
    println!("Row groups: {}", metadata.row_groups.len());
    for rg in &metadata.row_groups {
        println!(
            "  {:>4}  first row {:>10}  rows {:>10}  bytes {:>12}",
            rg.index, rg.first_row, rg.num_rows, rg.total_byte_size
        );
    }

    let partitions = reader.create_partitions(partition_size_bytes);
    println!();
    println!(
        "Partitions at {} bytes: {}",
        partition_size_bytes,
        partitions.len()
    );
    for partition in &partitions {
        println!(
            "  {:>4}  row groups {:?}  rows {:>10}  bytes {:>12}",
            partition.partition_id, partition.row_groups, partition.num_rows, partition.byte_size
        );
    }
}

async fn print_head(
    reader: Arc<dyn TableReader>,
    selection: &ColumnSelection,
    start: u64,
    rows: u64,
) -> anyhow::Result<()> {
    let num_rows = reader.metadata().num_rows;
    let count = rows.min(num_rows.saturating_sub(start));
    let table = reader.read_rows(selection, start, count).await?;

    println!("{}", table.column_names().join("\t"));
    for row in 0..table.num_rows() {
        let values: Vec<String> = table
            .columns()
            .iter()
            .map(|column| column.display_value(row))
            .collect();
        println!("{}", values.join("\t"));
    }

    if table.num_rows() == 0 {
        println!("(no rows at offset {}; file has {})", start, num_rows);
    }
    Ok(())
}

/// CLI utility functions for parsing command-line arguments
mod cli {
    use pq_reader::parquet::ColumnSelection;

    /// Parse human-readable size strings like "10MB", "1GB", "512KB"
    pub fn parse_size_string(s: &str) -> anyhow::Result<u64> {
        let s = s.trim().to_uppercase();

        let (number_part, unit_part) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
            s.split_at(pos)
        } else {
            // No unit, assume bytes
            return s
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("Invalid size: {}", e));
        };

        let number: u64 = number_part
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid size number '{}': {}", number_part, e))?;

        let multiplier: u64 = match unit_part.trim() {
            "B" => 1,
            "KB" => 1024,
            "MB" => 1024 * 1024,
            "GB" => 1024 * 1024 * 1024,
            "TB" => 1024 * 1024 * 1024 * 1024,
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid size unit '{}'. Valid units: B, KB, MB, GB, TB",
                    unit_part
                ));
            }
        };

        number
            .checked_mul(multiplier)
            .ok_or_else(|| anyhow::anyhow!("Size '{}' is too large", s))
    }

    /// Parse a column list "a,b,c" into a selection by name
    pub fn parse_columns(list: &str) -> anyhow::Result<ColumnSelection> {
        let mut names: Vec<String> = Vec::new();

        for name in list.split(',') {
            let name = name.trim();
            if name.is_empty() {
                return Err(anyhow::anyhow!("Column names cannot be empty in '{}'", list));
            }
            if names.iter().any(|n| n == name) {
                return Err(anyhow::anyhow!("Duplicate column '{}' in column list", name));
            }
            names.push(name.to_string());
        }

        Ok(ColumnSelection::Names(names))
    }

}
