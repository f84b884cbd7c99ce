//! Command line parsing

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use spdif_core::NUM_CHANNELS;

pub const USAGE: &str = "\
Usage: spdif-sim [options]

  --config <path>   mixer configuration (default: user config dir)
  --seconds <s>     length of the simulation (default 10)
  --rates a,b,c     input sample rates in Hz, 0 = unplugged (default 48000,44100,96000)
  --ppm a,b,c       clock error of each input in ppm (default 100,-80,0)
  --out <wav>       rendered mix (default mix.wav)
  --play            monitor through the sound card instead of writing a file";

#[derive(Debug, Clone, PartialEq)]
pub struct SimArgs {
    pub config: Option<PathBuf>,
    pub seconds: f64,
    pub rates: [u32; NUM_CHANNELS],
    pub ppm: [f64; NUM_CHANNELS],
    pub out: PathBuf,
    pub play: bool,
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            config: None,
            seconds: 10.0,
            rates: [48000, 44100, 96000],
            ppm: [100.0, -80.0, 0.0],
            out: PathBuf::from("mix.wav"),
            play: false,
        }
    }
}

impl SimArgs {
    /// Parse everything after the program name
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .with_context(|| format!("{} needs a value", arg))
            };
            match arg.as_str() {
                "--config" => parsed.config = Some(PathBuf::from(value()?)),
                "--seconds" => {
                    let raw = value()?;
                    parsed.seconds = raw
                        .parse()
                        .with_context(|| format!("invalid --seconds '{}'", raw))?;
                    if !(parsed.seconds > 0.0 && parsed.seconds.is_finite()) {
                        bail!("--seconds must be positive");
                    }
                }
                "--rates" => parsed.rates = parse_triple(&value()?, "--rates")?,
                "--ppm" => parsed.ppm = parse_triple(&value()?, "--ppm")?,
                "--out" => parsed.out = PathBuf::from(value()?),
                "--play" => parsed.play = true,
                other => bail!("unknown argument '{}'\n\n{}", other, USAGE),
            }
        }

        Ok(parsed)
    }
}

fn parse_triple<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<[T; NUM_CHANNELS]> {
    let values = raw
        .split(',')
        .map(|v| v.trim().parse::<T>().ok())
        .collect::<Option<Vec<T>>>()
        .with_context(|| format!("invalid {} '{}'", flag, raw))?;
    values
        .try_into()
        .map_err(|_| anyhow::anyhow!("{} takes exactly {} values", flag, NUM_CHANNELS))
}
