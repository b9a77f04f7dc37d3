use clap::{Args as ClapArgs, Parser, Subcommand};
use query_engine::{Aggregate, Config, Database, QueryView};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Inspect and query tables through composable views", long_about = None)]
struct Args {
    /// Database file; an in-memory database is used when omitted
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Seconds to wait on a locked database
    #[arg(long, default_value_t = 5)]
    busy_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables in the database
    Tables,
    /// Describe a table: row count and columns
    Describe { table: String },
    /// Print the SQL a view renders to
    Sql {
        table: String,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Count the rows of a view
    Count {
        table: String,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Print the first rows of a view
    Show {
        table: String,
        #[command(flatten)]
        view: ViewArgs,
        /// Number of rows to show
        #[arg(short, long)]
        rows: Option<usize>,
    },
    /// Print an approximate random sample of a view
    Sample {
        table: String,
        #[command(flatten)]
        view: ViewArgs,
        /// Number of rows to draw
        #[arg(short = 'n', long)]
        rows: Option<u64>,
    },
}

#[derive(ClapArgs, Debug)]
struct ViewArgs {
    /// Columns to project, comma separated
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,
    /// Column to sort by
    #[arg(long)]
    sort: Option<String>,
    /// Sort in descending order
    #[arg(long, requires = "sort")]
    desc: bool,
    /// Column to group by
    #[arg(long)]
    group: Option<String>,
    /// Aggregate applied to the other columns of a group (SUM, COUNT, MAX, MIN, AVG)
    #[arg(long, requires = "group")]
    aggregate: Option<String>,
    /// Maximum number of rows
    #[arg(long)]
    limit: Option<u64>,
}

impl ViewArgs {
    fn apply(&self, view: QueryView) -> query_engine::Result<QueryView> {
        let mut view = view;
        if !self.select.is_empty() {
            view = view.select(self.select.as_slice())?;
        }
        if let Some(group) = &self.group {
            let aggregate = self
                .aggregate
                .as_deref()
                .map(str::parse::<Aggregate>)
                .transpose()?;
            view = view.group(group.as_str(), None, aggregate)?;
        }
        if let Some(sort) = &self.sort {
            view = view.sort(sort.as_str(), self.desc)?;
        }
        if let Some(limit) = self.limit {
            view = view.limit(limit)?;
        }
        Ok(view)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config {
        path: args.database.clone(),
        busy_timeout: std::time::Duration::from_secs(args.busy_timeout),
        ..Config::default()
    };
    info!(database = %config.store_name(), "opening database");
    let db = Database::open_with(config)?;

    match &args.command {
        Command::Tables => {
            for table in db.list_tables()? {
                println!("{}", table);
            }
        }
        Command::Describe { table } => {
            println!("{}", db.table(table)?.summary()?);
        }
        Command::Sql { table, view } => {
            println!("{}", view.apply(db.table(table)?)?.formulate());
        }
        Command::Count { table, view } => {
            println!("{}", view.apply(db.table(table)?)?.len()?);
        }
        Command::Show { table, view, rows } => {
            let rows = rows.unwrap_or(db.config().preview_rows);
            println!("{}", view.apply(db.table(table)?)?.preview(rows)?);
        }
        Command::Sample { table, view, rows } => {
            let view = view.apply(db.table(table)?)?;
            let frame = match rows {
                Some(rows) => view.sample(*rows)?,
                None => view.sample_default()?,
            };
            println!("{}", frame);
        }
    }

    db.close()?;
    Ok(())
}
