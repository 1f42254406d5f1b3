use ssfs::fs::Ssfs;
use std::io::{self, Write};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let image = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("Usage: ssfs <disk_image>");
            std::process::exit(1);
        }
    };

    let mut ssfs = Ssfs::new();

    println!("Filesystem shell opened on {image}.");
    println!("Type 'help' for commands.");

    loop {
        // Print prompt
        print!("> ");
        io::stdout().flush().unwrap();

        // Read input
        let mut input = String::new();
        if io::stdin().read_line(&mut input).unwrap() == 0 {
            break;
        }

        // Parse command
        let parts: Vec<&str> = input.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        let command = parts[0];
        let args = &parts[1..];

        match command {
            "format" => {
                let inodes = args.first().and_then(|s| s.parse().ok()).unwrap_or(1);
                match ssfs.format(&image, inodes) {
                    Ok(()) => println!("Volume formatted with at least {} inodes.", inodes.max(1)),
                    Err(e) => println!("Error: {:?}", e),
                }
            }
            "mount" => match ssfs.mount(&image) {
                Ok(()) => println!("Volume mounted."),
                Err(e) => println!("Error: {:?}", e),
            },
            "unmount" => match ssfs.unmount() {
                Ok(()) => println!("Volume unmounted."),
                Err(e) => println!("Error: {:?}", e),
            },
            "create" => match ssfs.create() {
                Ok(n) => println!("File created.\ninode: {}", n),
                Err(e) => println!("Error: {:?}", e),
            },
            "delete" => {
                if let Some(n) = args.first().and_then(|s| s.parse().ok()) {
                    println!("{:?}", ssfs.delete(n));
                } else {
                    println!("Usage: delete <inode>");
                }
            }
            "stat" => {
                if let Some(n) = args.first().and_then(|s| s.parse().ok()) {
                    match ssfs.stat(n) {
                        Ok(size) => println!("File size: {} bytes", size),
                        Err(e) => println!("Error: {:?}", e),
                    }
                } else {
                    println!("Usage: stat <inode>");
                }
            }
            "read" => {
                if args.len() >= 3 {
                    let n = args[0].parse().unwrap_or(u32::MAX);
                    let offset = args[1].parse().unwrap_or(0);
                    let len = args[2].parse().unwrap_or(0);
                    let mut buf = vec![0u8; len];

                    match ssfs.read(n, offset, &mut buf) {
                        Ok(bytes_read) => {
                            // Try to print as string, otherwise print bytes
                            let output = String::from_utf8_lossy(&buf[..bytes_read]);
                            println!("Read {} bytes: {:?}", bytes_read, output);
                        }
                        Err(e) => println!("Error: {:?}", e),
                    }
                } else {
                    println!("Usage: read <inode> <offset> <size>");
                }
            }
            "write" => {
                if args.len() >= 3 {
                    let n = args[0].parse().unwrap_or(u32::MAX);
                    let offset = args[1].parse().unwrap_or(0);
                    // Join the rest of the arguments as data
                    let data = args[2..].join(" ");
                    match ssfs.write(n, offset, data.as_bytes()) {
                        Ok(bytes_written) => println!("Written {} bytes.", bytes_written),
                        Err(e) => println!("Error: {:?}", e),
                    }
                } else {
                    println!("Usage: write <inode> <offset> <data>");
                }
            }
            "exit" => break,
            "help" => {
                println!("COMMANDS");
                let commands = [
                    ("format [inodes]", "format the volume"),
                    ("mount", "mount the volume"),
                    ("unmount", "unmount the volume"),
                    ("create", "create a file"),
                    ("delete <inode>", "delete a file"),
                    ("stat <inode>", "display file size"),
                    ("read <inode> <offset> <size>", "read bytes from a file"),
                    ("write <inode> <offset> <string>", "write a string to a file"),
                    ("exit", "exit the shell"),
                ];
                for (cmd, desc) in commands {
                    println!("  {:<30} {}", cmd, desc);
                }
            }
            _ => println!("Unknown command: {}", command),
        }
    }
}
