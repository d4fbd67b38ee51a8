//! Sitescript CLI
//!
//! Serve a service directory, or run, render and inspect single files.

use clap::{Parser, Subcommand};
use colored::*;
use sitescript::files::ServiceDir;
use sitescript::http::{self, App, Request, Response};
use sitescript::lexer::Lexer;
use sitescript::parser::parse_source;
use sitescript::session::SessionStore;
use sitescript::template::{self, RenderContext, TemplateParser};
use sitescript::{logging, Config, ScriptRuntime, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sitescript")]
#[command(version)]
#[command(about = "Sitescript - server-side scripts and templates", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./sitescript.toml when present)
    #[arg(long, global = true, env = "SITESCRIPT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level or filter directive, e.g. `debug` or `sitescript=trace`
    #[arg(long, global = true, env = "SITESCRIPT_LOG", value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the service directory over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, env = "SITESCRIPT_PORT")]
        port: Option<u16>,

        /// Service directory with routes, scripts, templates and static files
        #[arg(long, env = "SITESCRIPT_ROOT", value_name = "DIR")]
        root: Option<PathBuf>,
    },
    /// Execute a script against a synthetic request
    ///
    /// Examples:
    ///   sitescript run login.sc --method POST --form user=eve
    ///   sitescript run home.sc --cookie sid=abc --root service
    Run {
        /// The script to run
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, default_value = "GET")]
        method: String,

        #[arg(long, default_value = "/")]
        path: String,

        /// Form field for the request body (repeatable)
        #[arg(long = "form", value_name = "KEY=VALUE")]
        form: Vec<String>,

        /// Request cookie (repeatable)
        #[arg(long = "cookie", value_name = "KEY=VALUE")]
        cookies: Vec<String>,

        /// Directory templates are loaded from
        #[arg(long, env = "SITESCRIPT_ROOT", value_name = "DIR")]
        root: Option<PathBuf>,
    },
    /// Render a template with a JSON object as its variables
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
    /// Tokenize a script and print the tokens
    Lex {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Parse a script and print the AST
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a script for errors without running it
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| {
        logging::init(cli.log_level.as_deref().unwrap_or(&config.log_level));

        match cli.command {
            Commands::Serve { port, root } => serve(config, port, root),
            Commands::Run {
                file,
                method,
                path,
                form,
                cookies,
                root,
            } => run_script(&config, &file, &method, &path, &form, &cookies, root),
            Commands::Render { file, data } => render_file(&config, &file, data.as_deref()),
            Commands::Lex { file } => lex_file(&file),
            Commands::Parse { file, json } => parse_file(&file, json),
            Commands::Check { file } => check_file(&file),
        }
    });

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => {
            let default = Path::new("sitescript.toml");
            if default.exists() {
                Config::load(default)?
            } else {
                Config::default()
            }
        }
    };
    Ok(config)
}

fn serve(mut config: Config, port: Option<u16>, root: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(root) = root {
        config.server.root = root;
    }

    let app = Arc::new(App::from_config(&config)?);

    println!(
        "{} {}",
        "Sitescript server running on".green().bold(),
        format!("http://{}", config.server.address()).cyan()
    );
    println!("   Routes registered: {}", app.router().len());
    println!("Press Ctrl+C to stop");
    println!();

    http::serve(&config.server, app)?;
    println!("Server shutdown.");
    Ok(())
}

fn split_pair(pair: &str) -> anyhow::Result<(&str, &str)> {
    pair.split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got '{}'", pair))
}

fn run_script(
    config: &Config,
    file: &Path,
    method: &str,
    path: &str,
    form: &[String],
    cookies: &[String],
    root: Option<PathBuf>,
) -> anyhow::Result<()> {
    let source = fs::read_to_string(file)?;

    let mut request = Request::new(method, path);
    for pair in cookies {
        let (name, value) = split_pair(pair)?;
        request = request.with_cookie(name, value);
    }
    if !form.is_empty() {
        let body = form
            .iter()
            .map(|pair| {
                let (key, value) = split_pair(pair)?;
                Ok(format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                ))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
            .join("&");
        request = request
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(&body);
    }

    let root = root.unwrap_or_else(|| config.server.root.clone());
    let runtime = ScriptRuntime::new(Arc::new(ServiceDir::new(root)), Arc::new(SessionStore::new()))
        .with_lists(config.lists.clone())
        .with_limits(config.limits);

    let response = runtime.run_source(&source, &request)?;
    print_response(&response);
    Ok(())
}

fn print_response(response: &Response) {
    let status = response.status_line();
    if response.status < 400 {
        println!("{}", status.green().bold());
    } else {
        println!("{}", status.red().bold());
    }
    for (name, value) in &response.headers {
        println!("{}: {}", name.cyan(), value);
    }
    for cookie in &response.cookies {
        println!("{}: {}", "Set-Cookie".cyan(), cookie);
    }
    println!();
    println!("{}", response.body);
}

fn render_file(config: &Config, file: &Path, data: Option<&str>) -> anyhow::Result<()> {
    let source = fs::read_to_string(file)?;

    let mut context = RenderContext::new();
    context.lists = config.lists.clone();
    if let Some(data) = data {
        let json: serde_json::Value = serde_json::from_str(data)?;
        match Value::from(json) {
            Value::Object(fields) => context.variables.extend(fields),
            other => anyhow::bail!("--data must be a JSON object, got {}", other.type_name()),
        }
    }

    let nodes = TemplateParser::new(&source, config.limits.max_template_nodes).parse();
    print!("{}", template::render(&nodes, &context));
    Ok(())
}

fn lex_file(path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;

    for token in Lexer::new(&source) {
        let token = token?;
        println!("{:>4}:{:<4} {:?}", token.line, token.column, token.kind);
    }

    Ok(())
}

fn parse_file(path: &Path, json: bool) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    let ast = parse_source(&source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ast)?);
    } else {
        println!("{:#?}", ast);
    }

    Ok(())
}

fn check_file(path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    parse_source(&source)?;

    println!("{} No errors found in {}", "✓".green(), path.display());
    Ok(())
}
