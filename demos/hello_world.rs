use vfs_facade::{Config, DirFS, Filesystem, MapFS};

fn main() -> vfs_facade::Result<()> {
    let tmp = std::env::temp_dir();
    println!("Temp dir: {}", tmp.display());

    let root = tmp.join("my_vfs");

    // creates `/tmp/my_vfs` on host if needed; every path below is relative to it
    let mut fs = Filesystem::new(DirFS::new(&root)?);

    // leading slash, doubled separator and surrounding spaces are cleaned up:
    // the file lands in `/tmp/my_vfs/docs/first.txt`
    fs.write(" /docs//first.txt ", b"Hello", Config::default())?;
    assert!(fs.file_exists("docs/first.txt")?);

    // `..` is resolved before the backend sees the path
    fs.write("docs/../second.txt", b"World", Config::default())?;
    assert!(fs.file_exists("second.txt")?);

    // escaping the root is refused
    assert!(fs.read("../etc/passwd").is_err());

    let first = fs.read("docs/first.txt")?;
    let second = fs.read("second.txt")?;
    println!(
        "{}, {}!",
        String::from_utf8_lossy(&first),
        String::from_utf8_lossy(&second)
    );

    for entry in fs.list_contents("", Filesystem::LIST_DEEP)?.sort_by_path()? {
        let entry = entry?;
        println!("{:>9} {}", if entry.is_dir() { "<dir>" } else { "" }, entry.path());
    }

    // the same calls work against memory
    let mut mem = Filesystem::new(MapFS::new());
    mem.copy_file("a.txt", "b.txt", Config::default()).unwrap_err();
    mem.write("a.txt", b"in memory", Config::default())?;
    mem.copy_file("a.txt", "b.txt", Config::default())?;
    println!("{} -> {}", mem.mime_type("b.txt")?, String::from_utf8_lossy(&mem.read("b.txt")?));

    // removes everything created above
    fs.delete_directory("")?;
    Ok(())
}
