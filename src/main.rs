use jvmgen::jvm::class_file::{ConstantVisitor, ConstantsPool, Deserialize, Utf8ConstantIndex};
use jvmgen::*;

use clap::{App, Arg};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// What to print, decided from the command line
struct Settings {
    input: PathBuf,
    classes_only: bool,
}

/// Collects the names of class references
#[derive(Default)]
struct ClassNames(Vec<Utf8ConstantIndex>);

impl ConstantVisitor for ClassNames {
    fn visit_class(&mut self, name: Utf8ConstantIndex) {
        self.0.push(name);
    }
}

fn main() -> Result<(), jvm::Error> {
    env_logger::init();

    let matches = App::new("Constant pool dumper")
        .version("0.1.0")
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Prints the constant pool of a JVM class file")
        .arg(
            Arg::with_name("classes")
                .long("classes")
                .help("Only print the names of referenced classes"),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the class file to read")
                .required(true)
                .index(1),
        )
        .get_matches();

    let settings = Settings {
        input: PathBuf::from(matches.value_of_os("INPUT").unwrap_or_default()),
        classes_only: matches.is_present("classes"),
    };

    log::info!("Reading '{}'", settings.input.display());
    let mut reader = BufReader::new(File::open(&settings.input)?);
    let constants = read_constants(&mut reader)?;

    if settings.classes_only {
        let mut names = ClassNames::default();
        for (_, constant) in constants.iter() {
            constant.accept(&mut names);
        }
        for name in names.0 {
            println!("{}", constants.utf8(name)?);
        }
    } else {
        for (index, constant) in constants.iter() {
            println!("#{} = {:?}", index.0, constant.resolve(&constants)?);
        }
    }

    Ok(())
}

/// Read the header of a class file, up to and including its constant pool
fn read_constants(reader: &mut BufReader<File>) -> Result<ConstantsPool, jvm::Error> {
    let magic = u32::deserialize(reader)?;
    if magic != 0xCAFEBABE {
        return Err(jvm::Error::BadMagic(magic));
    }
    let minor = u16::deserialize(reader)?;
    let major = u16::deserialize(reader)?;
    log::debug!("Class file version {}.{}", major, minor);

    ConstantsPool::deserialize(reader)
}
