use std::{
    env,
    ffi::OsStr,
    fs,
    io::{stderr, Write},
    path::{Path, PathBuf},
    process,
};

use getopts::Options;

use jackal::compiler;

fn usage(prog: &str) -> ! {
    let path = Path::new(prog);
    let leaf = path
        .file_name()
        .map(|x| x.to_str().unwrap_or("jackal"))
        .unwrap_or("jackal");
    writeln!(&mut stderr(), "Usage: {} [-h] <file.jack | directory>", leaf).ok();
    process::exit(1)
}

/// The `.jack` files to compile: the path itself, or the top level of the
/// directory it names (no recursion), in sorted order so runs are
/// deterministic. Anything else yields an empty list.
fn jack_files(path: &Path) -> Vec<PathBuf> {
    let is_jack = |p: &Path| p.extension() == Some(OsStr::new("jack"));
    if path.is_dir() {
        let mut files = match fs::read_dir(path) {
            Ok(entries) => entries
                .filter_map(|x| x.ok())
                .map(|x| x.path())
                .filter(|p| p.is_file() && is_jack(p))
                .collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    } else if path.is_file() && is_jack(path) {
        vec![path.to_path_buf()]
    } else {
        Vec::new()
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = &args[0];
    let matches = Options::new()
        .optflag("h", "help", "")
        .parse(&args[1..])
        .unwrap_or_else(|_| usage(prog));
    if matches.opt_present("h") || matches.free.len() != 1 {
        usage(prog);
    }

    let path = Path::new(&matches.free[0]);
    let files = jack_files(path);
    if files.is_empty() {
        eprintln!(
            "invalid compilation input \"{}\": must be a .jack file or a directory containing at least one .jack file",
            path.display()
        );
        process::exit(1);
    }
    for file in &files {
        if let Err(e) = compiler::compile_file(file) {
            e.console_print(file);
            process::exit(1);
        }
    }
}
