use clap::Parser;

use cloudseed_core::config::ConfigOverrides;

#[derive(Parser)]
#[command(
    name = "cloudseed",
    version,
    about = "Bootstrap a local database for migration to cloud storage",
    after_help = "\
Steps, each stopping the run on failure:
  1. create CLOUDMANIFEST in the database directory    (exit 2)
  2. read it back and decode it                        (exit 3)
  3. upload it unless the destination already has one  (exit 4)
  4. write IDENTITY via IDENTITY.tmp and a rename      (exit 5)
  5. register the new dbid for the destination path    (exit 6)

Configuration and setup errors exit with 1.

Environment variables:
  CLOUDSEED_CONFIG        Path to a YAML configuration file
  AWS_ACCESS_KEY_ID       Access key when none is configured
  AWS_SECRET_ACCESS_KEY   Secret key when none is configured"
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides CLOUDSEED_CONFIG)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Local database directory
    #[arg(long = "dbpath")]
    pub db_path: Option<String>,

    /// Bucket the database was previously stored in
    #[arg(long)]
    pub src_bucket: Option<String>,

    /// Path within the source bucket
    #[arg(long)]
    pub src_path: Option<String>,

    /// Bucket to publish the cloud manifest to
    #[arg(long)]
    pub dest_bucket: Option<String>,

    /// Path within the destination bucket
    #[arg(long)]
    pub dest_path: Option<String>,

    /// Object store region
    #[arg(long)]
    pub region: Option<String>,

    /// S3-compatible endpoint URL, or file://<dir> for a local directory
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Access key id for the object store
    #[arg(long = "aws-access-key-id")]
    pub access_key_id: Option<String>,

    /// Secret access key for the object store
    #[arg(long = "aws-secret-access-key")]
    pub secret_access_key: Option<String>,

    /// Bucket holding dbid registrations (default: destination bucket)
    #[arg(long)]
    pub registry_bucket: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            db_path: self.db_path.clone(),
            src_bucket: self.src_bucket.clone(),
            src_path: self.src_path.clone(),
            dest_bucket: self.dest_bucket.clone(),
            dest_path: self.dest_path.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
            registry_bucket: self.registry_bucket.clone(),
        }
    }
}
