use clap::Args;
use itb_archive::{ExtractOptions, ItbArchive, MAX_NAME_LENGTH};
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::PathBuf,
};
use tracing::info;

#[derive(Args)]
pub struct UnpackArgs {
    /// An input ITB resource file
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    directory: PathBuf,

    /// Fail instead of overwriting files that already exist
    #[arg(long, default_value_t = false)]
    no_clobber: bool,

    /// Print the entries of the archive without writing anything
    #[arg(long, default_value_t = false)]
    list: bool,

    /// Longest entry name accepted, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = MAX_NAME_LENGTH)]
    max_name_length: u32,
}

impl UnpackArgs {
    pub fn handle(&self) -> Result<()> {
        let f = File::open(&self.archive)
            .into_diagnostic()
            .context(format!("cannot open {}", &self.archive.display()))?;
        let itb = ItbArchive::new(BufReader::new(f))
            .context(format!("reading {}", &self.archive.display()))?
            .with_max_name_length(self.max_name_length);

        if self.list {
            return Self::list(itb);
        }

        std::fs::create_dir_all(&self.directory)
            .into_diagnostic()
            .context(format!("creating {}", &self.directory.display()))?;

        let count = itb.len();
        let options = ExtractOptions::builder()
            .overwrite(!self.no_clobber)
            .build();
        itb.extract(&self.directory, &options)
            .context(format!("unpacking {}", &self.archive.display()))?;

        info!("unpacked {} files into {}", count, self.directory.display());
        Ok(())
    }

    fn list(mut itb: ItbArchive<BufReader<File>>) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        while let Some(entry) = itb.next_entry()? {
            writeln!(stdout, "{:>12}  {}", entry.size(), entry.name()).into_diagnostic()?;
        }
        Ok(())
    }
}
