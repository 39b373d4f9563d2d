use crate::describe::{DescriptionOptions, LengthBudgets};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

const MAX_BUDGET: usize = 1000;

#[derive(Debug, Clone, Parser)]
#[command(name = "seo-description-mcp")]
#[command(about = "MCP server that generates meta descriptions from site content", long_about = None)]
pub struct AppConfig {
    #[arg(long, env = "SITE_FILE")]
    pub site_file: Option<PathBuf>,

    #[arg(long, env = "AUTO_DESCRIPTION", default_value_t = true, action = ArgAction::Set)]
    pub auto_description: bool,

    #[arg(long, env = "DESCRIPTION_ADDITIONS", default_value_t = true, action = ArgAction::Set)]
    pub description_additions: bool,

    #[arg(long, env = "DESCRIPTION_BLOGNAME", default_value_t = true, action = ArgAction::Set)]
    pub description_blogname: bool,

    #[arg(long, env = "DESCRIPTION_SEPARATOR", default_value = "|")]
    pub description_separator: String,

    #[arg(long, env = "ADDITIONS_CONNECTOR", default_value = "on")]
    pub additions_connector: String,

    #[arg(long, env = "SEARCH_BUDGET", default_value_t = 160)]
    pub search_budget: usize,

    #[arg(long, env = "OPENGRAPH_BUDGET", default_value_t = 190)]
    pub opengraph_budget: usize,

    #[arg(long, env = "TWITTER_BUDGET", default_value_t = 155)]
    pub twitter_budget: usize,
}

impl AppConfig {
    pub fn from_env_and_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, budget) in [
            ("search_budget", self.search_budget),
            ("opengraph_budget", self.opengraph_budget),
            ("twitter_budget", self.twitter_budget),
        ] {
            if budget == 0 {
                return Err(format!("{name} must be > 0"));
            }
            if budget > MAX_BUDGET {
                return Err(format!("{name} too large (max {MAX_BUDGET})"));
            }
        }
        if self.description_separator.trim().is_empty() {
            return Err("description_separator must not be empty".into());
        }
        if let Some(path) = &self.site_file {
            if !path.exists() {
                return Err("site file does not exist".into());
            }
        }
        Ok(())
    }

    pub fn description_options(&self) -> DescriptionOptions {
        DescriptionOptions {
            auto_description: self.auto_description,
            additions: self.description_additions,
            additions_sitename: self.description_blogname,
            separator: self.description_separator.clone(),
            connector: self.additions_connector.clone(),
            budgets: LengthBudgets {
                search: self.search_budget,
                opengraph: self.opengraph_budget,
                twitter: self.twitter_budget,
            },
        }
    }
}
