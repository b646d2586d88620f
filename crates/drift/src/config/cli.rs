//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::merge::MergeStrategy;

use super::Config;

/// Merge many CSV files into a single CSV object.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliArgs {
    /// Path to configuration file (can be specified multiple times)
    #[arg(short, long)]
    pub config: Vec<PathBuf>,

    /// Override the merge strategy from the config
    #[arg(long, value_enum)]
    pub strategy: Option<MergeStrategy>,

    /// List the source files and exit without writing
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Apply command line overrides to a loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(strategy) = self.strategy {
            config.merge.strategy = strategy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeatable_config_and_strategy() {
        let args = CliArgs::parse_from([
            "drift",
            "-c",
            "base.yaml",
            "--config",
            "prod.yaml",
            "--strategy",
            "append-rewrite",
            "--dry-run",
        ]);
        assert_eq!(
            args.config,
            vec![PathBuf::from("base.yaml"), PathBuf::from("prod.yaml")]
        );
        assert_eq!(args.strategy, Some(MergeStrategy::AppendRewrite));
        assert!(args.dry_run);
    }

    #[test]
    fn test_strategy_override_applied() {
        let mut config =
            Config::parse("source:\n  path: /in\nsink:\n  path: /out\n").unwrap();
        let args = CliArgs::parse_from(["drift", "-c", "a.yaml", "--strategy", "append-rewrite"]);
        args.apply_overrides(&mut config);
        assert_eq!(config.merge.strategy, MergeStrategy::AppendRewrite);

        let args = CliArgs::parse_from(["drift", "-c", "a.yaml"]);
        args.apply_overrides(&mut config);
        assert_eq!(config.merge.strategy, MergeStrategy::AppendRewrite);
    }
}
