use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;
use uf2_core::family::FamilyRegistry;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build,
    /// Run uf2conv, forwarding any extra arguments
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the workspace tests
    Test,
    /// Print the known family IDs as a Markdown table
    Families,
}

fn cargo(args: &[&str], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{} failed", what);
    }
    Ok(())
}

fn families_table(registry: &FamilyRegistry) -> String {
    let mut out = String::from("| Name | ID | Description |\n|------|----|-------------|\n");
    for family in registry.entries() {
        out.push_str(&format!(
            "| {} | 0x{:08x} | {} |\n",
            family.short_name, family.id, family.description
        ));
    }
    out
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building project...");
            cargo(&["build", "--workspace"], "Build")?;
        }
        Commands::Run { args } => {
            println!("Running uf2conv...");
            let mut full = vec!["run", "-p", "uf2-cli", "--"];
            full.extend(args.iter().map(String::as_str));
            cargo(&full, "Run")?;
        }
        Commands::Test => {
            cargo(&["test", "--workspace"], "Tests")?;
        }
        Commands::Families => {
            print!("{}", families_table(&FamilyRegistry::builtin()));
        }
    }

    Ok(())
}
