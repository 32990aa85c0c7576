use std::fs;
use std::path::{Path, PathBuf};

/// A source subtree and the tokens it must never contain.
struct Guard {
    root: &'static [&'static str],
    what: &'static str,
    forbidden: &'static [&'static str],
}

const GUARDS: &[Guard] = &[
    // Counters stay content-free: no keys, names, addresses or clocks, and
    // no output of their own.
    Guard {
        root: &["src", "core", "observability"],
        what: "observability module",
        forbidden: &[
            "SessionKey",
            "ServiceKey",
            "KeyData",
            "Principal",
            "ClaimedIdentity",
            "std::net",
            "SocketAddr",
            "IpAddr",
            "SystemTime",
            "Instant",
            "log::",
            "info!(",
            "warn!(",
            "debug!(",
            "println!(",
            "eprintln!(",
        ],
    },
    // Key types print redacted, wipe through zeroize, and are never copied
    // or compared byte-wise.
    Guard {
        root: &["src", "key_management.rs"],
        what: "key types",
        forbidden: &[
            "derive(Debug",
            "derive(Clone",
            "Clone,",
            "PartialEq",
            "impl Drop",
            "Copy",
        ],
    },
];

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR missing");
    for guard in GUARDS {
        let root = guard
            .root
            .iter()
            .fold(PathBuf::from(&manifest_dir), |path, part| path.join(part));
        println!("cargo:rerun-if-changed={}", root.display());

        let mut files = Vec::new();
        collect_rs_files(&root, &mut files);
        for path in files {
            let contents = fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
            enforce(guard, &contents, &path);
        }
    }
}

fn collect_rs_files(path: &Path, files: &mut Vec<PathBuf>) {
    if path.is_file() {
        files.push(path.to_path_buf());
        return;
    }
    let Ok(entries) = fs::read_dir(path) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, files);
        } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            files.push(path);
        }
    }
}

fn enforce(guard: &Guard, contents: &str, path: &Path) {
    if let Some(token) = guard.forbidden.iter().find(|t| contents.contains(**t)) {
        panic!(
            "Forbidden token `{}` in {}: {}",
            token,
            guard.what,
            path.display()
        );
    }
}
