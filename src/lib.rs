//! Floods a form with generated responses.
//!
//! The form page is scraped once: every field container's `data-params`
//! configuration is parsed into a [`Field`], validators included. Each
//! submission then gets freshly generated answers that satisfy those
//! validators, and a pool of workers posts them concurrently.

pub mod client;
pub mod error;
pub mod extract;
pub mod generator;
mod parser;
pub mod pattern;
pub mod report;
pub mod schema;
pub mod spammer;

pub use self::client::{FormClient, Submit};
pub use self::error::{Error, Result};
pub use self::extract::extract_fields;
pub use self::generator::{Answer, Generator, Payload, Policy};
pub use self::schema::{Choice, Field, FieldType, Rule};
pub use self::spammer::{Spammer, Summary};

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// scrape a form and send generated responses to it
    Spam {
        #[command(flatten)]
        target: TargetArgs,

        /// number of responses to send
        #[arg(short, long, default_value_t = 500)]
        requests: usize,

        /// number of concurrent workers
        #[arg(short, long, visible_alias = "threads", default_value_t = 50)]
        workers: usize,

        /// write the outcome histogram to this csv file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// scrape a form, print its fields and one sample response without sending anything
    Inspect {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TargetArgs {
    /// form response url, https://docs.google.com/forms/d/e/<id>/formResponse
    #[arg(short, long)]
    pub url: String,

    /// only fill in the required fields
    #[arg(long, default_value_t = false)]
    pub required: bool,

    /// length of filler text for unconstrained answers
    #[arg(
        short,
        long,
        default_value_t = 80,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub garbage_length: usize,

    /// request timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,
}

impl TargetArgs {
    pub fn policy(&self) -> Policy {
        Policy {
            required_only: self.required,
            garbage_length: self.garbage_length,
        }
    }
}
