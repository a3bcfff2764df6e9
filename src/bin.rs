//! The `rsdlc` command line: PSARC packing, platform conversion and the
//! two compilation entry points.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use rsdlc::manifest::{ManifestConfig, build_manifest};
use rsdlc::psarc;
use rsdlc::score::load_playalong;
use rsdlc::sng::{compile_song, encode_sng};
use rsdlc::timeline::TimelineBuilder;
use rsdlc::xmltree;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extracts PSARC archives next to themselves.
    Unpack {
        /// Archive files.
        files: Vec<PathBuf>,
    },

    /// Packs directories into `<dir>.psarc`.
    Pack {
        /// Package directories.
        dirs: Vec<PathBuf>,
    },

    /// Converts packages between the PC and Mac platforms.
    Convert {
        /// Archive files (`*_m.psarc` or `*_p.psarc`).
        files: Vec<PathBuf>,
    },

    /// Compiles song XML files into binary SNG plus JSON manifest.
    Xml2sng {
        /// Song XML files.
        files: Vec<PathBuf>,
    },

    /// Lowers a Go PlayAlong file into song XML on standard output.
    Gpa2xml {
        /// The playalong file; the GPX score is resolved next to it.
        file: PathBuf,

        /// Track to compile.
        #[arg(short, long, default_value_t = 0)]
        track: usize,
    },

    /// Extracts tones from packages and profile saves.
    Tones {
        /// `.psarc` archives or `*_prfldb` profiles.
        files: Vec<PathBuf>,
    },
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Unpack { files } => {
            for file in files {
                let target = psarc::unpack(&file)?;
                println!("extracted {} to {}", file.display(), target.display());
            }
        }
        Command::Pack { dirs } => {
            for dir in dirs {
                let target = psarc::pack(&dir)?;
                println!("packed {} into {}", dir.display(), target.display());
            }
        }
        Command::Convert { files } => {
            for file in files {
                let target = psarc::convert_platform(&file)?;
                println!("converted {} to {}", file.display(), target.display());
            }
        }
        Command::Xml2sng { files } => {
            for file in files {
                let text = fs::read_to_string(&file)?;
                let tree = xmltree::from_xml(&text, xmltree::default_coerce)?;
                let mut song = rsdlc::sng::xml::song_from_tree(&tree)?;
                compile_song(&mut song)?;

                let manifest = build_manifest(&song, &ManifestConfig::default());
                let sng_path = file.with_file_name(format!("{}.sng", manifest.urn));
                let json_path = file.with_file_name(format!("{}.json", manifest.urn));
                fs::write(&sng_path, encode_sng(&song)?)?;
                fs::write(&json_path, serde_json::to_string_pretty(&manifest.document)?)?;
                println!("compiled {} to {}", file.display(), sng_path.display());
            }
        }
        Command::Gpa2xml { file, track } => {
            let loaded = load_playalong(&file)?;
            let song = TimelineBuilder::new(&loaded.score, track, &loaded.sync)?.run()?;
            let tree = rsdlc::sng::xml::song_to_tree(&song);
            println!("{}", xmltree::to_xml("song", &tree));
        }
        Command::Tones { files } => {
            let mut tones = Vec::new();
            for file in files {
                let name = file.to_string_lossy().into_owned();
                if name.ends_with(".psarc") {
                    let mut reader = std::io::BufReader::new(fs::File::open(&file)?);
                    tones.extend(psarc::profile::tones_from_archive(&mut reader)?);
                } else if name.ends_with("_prfldb") {
                    tones.extend(psarc::profile::tones_from_profile(&fs::read(&file)?)?);
                } else {
                    eprintln!("skipping {name}: neither archive nor profile");
                }
            }
            println!("{}", serde_json::to_string_pretty(&tones)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
