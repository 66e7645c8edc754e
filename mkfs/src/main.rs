use std::env::args;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let argv = args().collect::<Vec<String>>();

    if argv.len() != 4 {
        eprintln!("usage: mkfs <fs.img> <num_blocks> <num_inodes>");
        return ExitCode::FAILURE;
    }

    let filename = &argv[1];
    let num_blocks: u32 = match argv[2].parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("num_blocks must be a positive integer");
            return ExitCode::FAILURE;
        }
    };
    let num_inodes: u32 = match argv[3].parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("num_inodes must be a positive integer");
            return ExitCode::FAILURE;
        }
    };

    match v6fs::mkfs(filename, num_blocks, num_inodes) {
        Ok(()) => {
            println!("formatted {filename}: {num_blocks} blocks, {num_inodes} inodes");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("mkfs failed: {e}");
            ExitCode::FAILURE
        }
    }
}
