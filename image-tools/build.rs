use std::{env, fs, io::BufRead, path::PathBuf};

fn git<'a, I: IntoIterator<Item = &'a str>>(args: I) -> Option<std::process::Output> {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(env::var_os("CARGO_MANIFEST_DIR")?)
        .output()
        .ok()?;
    output.status.success().then_some(output)
}

fn git_commit_hash() -> Option<String> {
    let output = git(["rev-parse", "--short", "HEAD"])?;
    let mut lines = output.stdout.lines();
    let commit_hash = lines.next()?.ok()?;
    lines.next().is_none().then_some(commit_hash)
}

fn git_is_clean() -> bool {
    git(["status", "--porcelain"]).is_some_and(|output| output.stdout.is_empty())
}

fn main() {
    println!("cargo:rerun-if-env-changed=IMAGE_TOOLS_RELEASE");

    let doing_release = env::var("IMAGE_TOOLS_RELEASE")
        .map(|env| matches!(env.as_str(), "1" | "true"))
        .unwrap_or_default();

    let mut version = env!("CARGO_PKG_VERSION").to_owned();
    // Builds from a source archive have no commit to point at.
    if !doing_release {
        if let Some(commit_hash) = git_commit_hash() {
            version.push('+');
            version.push_str(&commit_hash);
            if !git_is_clean() {
                version.push_str(".dirty");
            }
        }
    }

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("cargo sets OUT_DIR"));
    fs::write(
        out_dir.join("version.rs"),
        format!("pub const VERSION: &str = {version:?};"),
    )
    .expect("unable to write version.rs");
}
