use lancaster_tarball::TarballReader;

use crate::cli::{IdCmd, LsCmd};
use crate::specs::expand_specs;

pub fn run_id(cmd: &IdCmd) -> Result<(), Box<dyn std::error::Error>> {
    let specs = expand_specs(&cmd.specs)?;
    let reader = TarballReader::open(specs)?;
    println!("{}", reader.hash_id());
    Ok(())
}

pub fn run_ls(cmd: &LsCmd) -> Result<(), Box<dyn std::error::Error>> {
    let specs = expand_specs(&cmd.specs)?;
    let reader = TarballReader::open(specs)?;
    for file in reader.files() {
        println!("{:>12}  {:o}  {}", file.size, file.mode, file.path);
    }
    Ok(())
}
