use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::{Captures, Regex};
use walkdir::WalkDir;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(\w+)%|\$\{(\w+)\}|\$(\w+)").unwrap());

/// Expand `%VAR%`, `${VAR}` and `$VAR` references from `env`.
/// References to unknown variables are left untouched.
pub fn resolve_env_variables(input: &str, env: &HashMap<String, String>) -> String {
    ENV_VAR_RE
        .replace_all(input, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match env.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Path conventions used when resolving completion roots.
///
/// Paths are handled as strings so both conventions behave identically on
/// every host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathStyle {
    #[default]
    Posix,
    /// `C:\` drive roots, `\` and `/` both separate components.
    DriveLetter,
}

impl PathStyle {
    pub fn from_drive_letter(drive_letter: bool) -> Self {
        if drive_letter {
            Self::DriveLetter
        } else {
            Self::Posix
        }
    }

    pub fn separator(self) -> char {
        match self {
            Self::Posix => '/',
            Self::DriveLetter => '\\',
        }
    }

    pub fn is_separator(self, ch: char) -> bool {
        match self {
            Self::Posix => ch == '/',
            Self::DriveLetter => ch == '/' || ch == '\\',
        }
    }

    /// Characters that start a path completion.
    pub fn trigger_characters(self) -> &'static [char] {
        match self {
            Self::Posix => &['/'],
            Self::DriveLetter => &['/', '\\'],
        }
    }

    /// Byte length of the root prefix (`/`, `C:\`, `C:`), if absolute.
    fn root_len(self, path: &str) -> Option<usize> {
        let bytes = path.as_bytes();
        match self {
            Self::Posix => path.starts_with('/').then_some(1),
            Self::DriveLetter => {
                if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
                    if bytes.len() >= 3 && (bytes[2] == b'\\' || bytes[2] == b'/') {
                        Some(3)
                    } else {
                        Some(2)
                    }
                } else if path.starts_with(['\\', '/']) {
                    Some(1)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_absolute(self, path: &str) -> bool {
        self.root_len(path).is_some()
    }

    /// Root of an absolute path; a bare `C:` becomes `C:\`.
    pub fn root(self, path: &str) -> Option<String> {
        let len = self.root_len(path)?;
        let mut root = path[..len].to_string();
        if self == Self::DriveLetter && len == 2 {
            root.push(self.separator());
        }
        Some(root)
    }

    pub fn ends_with_separator(self, path: &str) -> bool {
        path.chars().last().is_some_and(|ch| self.is_separator(ch))
    }

    /// Everything up to and including the last separator.
    pub fn dir_part(self, path: &str) -> &str {
        match path.rfind(|ch| self.is_separator(ch)) {
            Some(idx) => &path[..=idx],
            None => "",
        }
    }

    /// Everything after the last separator.
    pub fn file_part(self, path: &str) -> &str {
        &path[self.dir_part(path).len()..]
    }

    /// Parent directory of an absolute path; `None` at the root.
    pub fn parent(self, path: &str) -> Option<String> {
        let root_len = self.root_len(path)?;
        let trimmed = path.trim_end_matches(|ch| self.is_separator(ch));
        if trimmed.len() <= root_len {
            return None;
        }
        match trimmed.rfind(|ch| self.is_separator(ch)) {
            Some(idx) if idx >= root_len => {
                let parent = trimmed[..idx].trim_end_matches(|ch| self.is_separator(ch));
                if parent.len() < root_len {
                    self.root(path)
                } else {
                    Some(parent.to_string())
                }
            }
            _ => self.root(path),
        }
    }

    /// Join `rel` onto `base`, resolving `.` and `..` components.
    pub fn join(self, base: &str, rel: &str) -> String {
        let mut out = base.to_string();
        for component in rel.split(|ch| self.is_separator(ch)) {
            match component {
                "" | "." => {}
                ".." => {
                    if let Some(parent) = self.parent(&out) {
                        out = parent;
                    }
                }
                name => {
                    if !out.is_empty() && !self.ends_with_separator(&out) {
                        out.push(self.separator());
                    }
                    out.push_str(name);
                }
            }
        }
        out
    }
}

/// Computes the directory a path completion lists.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    style: PathStyle,
    env: HashMap<String, String>,
}

impl PathResolver {
    pub fn new(style: PathStyle) -> Self {
        Self {
            style,
            env: HashMap::new(),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn from_process_env(style: PathStyle) -> Self {
        Self::new(style).with_env(std::env::vars().collect())
    }

    pub fn style(&self) -> PathStyle {
        self.style
    }

    fn home(&self) -> Option<String> {
        self.env
            .get("HOME")
            .or_else(|| self.env.get("USERPROFILE"))
            .cloned()
            .or_else(|| dirs::home_dir().map(|home| home.to_string_lossy().into_owned()))
    }

    /// Expand environment references and a leading `~`.
    pub fn expand(&self, fragment: &str) -> String {
        let expanded = resolve_env_variables(fragment, &self.env);
        let mut chars = expanded.chars();
        if chars.next() == Some('~') && chars.next().is_none_or(|ch| self.style.is_separator(ch))
        {
            if let Some(home) = self.home() {
                return format!("{home}{}", &expanded[1..]);
            }
        }
        expanded
    }

    /// Resolve the absolute directory for `fragment`.
    ///
    /// 1. Absolute fragments: a trailing separator or an existing directory
    ///    is kept verbatim, anything else resolves to its parent.
    /// 2. `./` and `../` fragments are relative to the current file.
    /// 3. With a `root_hint`, the nearest ancestor of the current file (or
    ///    `cwd`) containing that entry; an empty hint means `cwd`, a hint
    ///    that is never found leaves the root unresolved.
    /// 4. Otherwise the current file's directory, then `cwd`.
    ///
    /// The directory part of a relative fragment is joined onto the base.
    pub fn get_root(
        &self,
        fragment: &str,
        root_hint: Option<&str>,
        filepath: Option<&str>,
        cwd: &str,
    ) -> Option<PathBuf> {
        let style = self.style;
        let expanded = self.expand(fragment);

        if style.is_absolute(&expanded) {
            if style.ends_with_separator(&expanded) || Path::new(&expanded).is_dir() {
                return Some(PathBuf::from(expanded));
            }
            let root = style.parent(&expanded).or_else(|| style.root(&expanded))?;
            return Some(PathBuf::from(root));
        }

        let file_dir = filepath
            .filter(|path| style.is_absolute(path))
            .and_then(|path| style.parent(path));
        let explicit_relative = expanded == "."
            || expanded == ".."
            || expanded.starts_with("./")
            || expanded.starts_with("../")
            || (style == PathStyle::DriveLetter
                && (expanded.starts_with(".\\") || expanded.starts_with("..\\")));

        let base = match root_hint {
            _ if explicit_relative => file_dir.unwrap_or_else(|| cwd.to_string()),
            Some("") => cwd.to_string(),
            Some(hint) => {
                let start = file_dir.unwrap_or_else(|| cwd.to_string());
                match self.find_ancestor(&start, hint) {
                    Some(dir) => dir,
                    None => {
                        tracing::debug!(hint, start, "No ancestor contains root hint");
                        return None;
                    }
                }
            }
            None => file_dir.unwrap_or_else(|| cwd.to_string()),
        };

        let root = style.join(&base, style.dir_part(&expanded));
        style.is_absolute(&root).then(|| PathBuf::from(root))
    }

    fn find_ancestor(&self, start: &str, hint: &str) -> Option<String> {
        let mut dir = self.style.is_absolute(start).then(|| start.to_string());
        while let Some(current) = dir {
            if Path::new(&self.style.join(&current, hint)).exists() {
                return Some(current);
            }
            dir = self.style.parent(&current);
        }
        None
    }
}

/// Glob patterns excluding files from completion.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    set: Option<GlobSet>,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut has_patterns = false;

        for pattern in patterns {
            let pattern = pattern.as_ref();
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    has_patterns = true;
                }
                Err(e) => {
                    tracing::warn!("Ignoring invalid exclude pattern '{pattern}': {e}");
                }
            }
        }

        if !has_patterns {
            return Self::default();
        }

        match builder.build() {
            Ok(set) => Self { set: Some(set) },
            Err(e) => {
                tracing::warn!("Failed to build exclude pattern set: {e}");
                Self::default()
            }
        }
    }

    pub fn is_match(&self, path: impl AsRef<Path>) -> bool {
        self.set.as_ref().is_some_and(|set| set.is_match(path))
    }
}

/// Drop empty names, optionally dot-prefixed names, and names matching
/// any exclude pattern.
pub fn filter_files<I, S>(names: I, exclude_hidden: bool, exclude: &ExcludeSet) -> Vec<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: Into<String>,
{
    names
        .into_iter()
        .flatten()
        .map(Into::into)
        .filter(|name| !name.is_empty())
        .filter(|name| !(exclude_hidden && name.starts_with('.')))
        .filter(|name| !exclude.is_match(name))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// Path relative to the base directory.
    pub name: String,
    pub is_dir: bool,
}

/// Entries under `root`, named relative to `base`. A missing root yields
/// no entries.
pub fn get_items_from_root(
    root: &Path,
    base: &Path,
    recursive: bool,
    exclude: &ExcludeSet,
) -> Vec<FileItem> {
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "Completion root is not a directory");
        return Vec::new();
    }

    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut items = Vec::new();
    let entries = walker
        .into_iter()
        .filter_entry(|entry| !exclude.is_match(entry.file_name()));
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        let path = entry.path();
        let rel = path.strip_prefix(base).unwrap_or(path);
        if exclude.is_match(rel) {
            continue;
        }
        let is_dir = entry.file_type().is_dir() || (entry.path_is_symlink() && path.is_dir());
        items.push(FileItem {
            name: rel.to_string_lossy().into_owned(),
            is_dir,
        });
    }
    items
}

fn is_path_char(ch: char) -> bool {
    !ch.is_whitespace()
        && !matches!(
            ch,
            '"' | '\'' | '`' | '(' | ')' | '[' | ']' | '<' | '>' | ',' | ';' | '=' | '|'
        )
}

/// Path-looking text ending at the cursor, if it contains a separator.
pub fn path_fragment(line_before_cursor: &str, style: PathStyle) -> Option<&str> {
    let start = line_before_cursor
        .char_indices()
        .rev()
        .take_while(|(_, ch)| is_path_char(*ch))
        .last()
        .map(|(idx, _)| idx)?;
    let fragment = &line_before_cursor[start..];
    if fragment.contains("://") {
        return None;
    }
    fragment
        .contains(|ch| style.is_separator(ch))
        .then_some(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_env_variables() {
        assert_eq!(
            resolve_env_variables("%HOME%/data%x%", &env(&[("HOME", "/home")])),
            "/home/data%x%"
        );
        assert_eq!(
            resolve_env_variables(
                "$HOME/${USER}/data",
                &env(&[("HOME", "/home"), ("USER", "foo")])
            ),
            "/home/foo/data"
        );
        assert_eq!(
            resolve_env_variables("$HOME/$PART", &env(&[("HOME", "/home")])),
            "/home/$PART"
        );
    }

    #[test]
    fn test_drive_letter_roots() {
        let resolver = PathResolver::new(PathStyle::DriveLetter);
        let root = |fragment: &str| resolver.get_root(fragment, None, None, "C:\\work");
        assert_eq!(root("C:\\user"), Some(PathBuf::from("C:\\")));
        assert_eq!(root("C:\\user\\"), Some(PathBuf::from("C:\\user\\")));
        assert_eq!(root("C:\\"), Some(PathBuf::from("C:\\")));
        assert_eq!(root("C:"), Some(PathBuf::from("C:\\")));
        assert_eq!(root("C:\\a\\b"), Some(PathBuf::from("C:\\a")));
    }

    #[test]
    fn test_drive_letter_relative_uses_file_dir() {
        let resolver = PathResolver::new(PathStyle::DriveLetter);
        assert_eq!(
            resolver.get_root("src\\", None, Some("D:\\proj\\main.c"), "C:\\work"),
            Some(PathBuf::from("D:\\proj\\src"))
        );
        assert_eq!(
            resolver.get_root("", None, None, "C:\\work"),
            Some(PathBuf::from("C:\\work"))
        );
    }

    #[test]
    fn test_posix_parent_and_join() {
        let style = PathStyle::Posix;
        assert_eq!(style.parent("/a/b"), Some("/a".to_string()));
        assert_eq!(style.parent("/a/b/"), Some("/a".to_string()));
        assert_eq!(style.parent("/a"), Some("/".to_string()));
        assert_eq!(style.parent("/"), None);
        assert_eq!(style.parent("rel/x"), None);
        assert_eq!(style.join("/a/b", "../c/./d/"), "/a/c/d");
        assert_eq!(style.join("/", "x"), "/x");
    }

    #[test]
    fn test_posix_absolute_fragments() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("file.txt"), "x").unwrap();
        let base = dir.path().to_str().unwrap();
        let resolver = PathResolver::new(PathStyle::Posix);

        let existing = format!("{base}/sub");
        assert_eq!(
            resolver.get_root(&existing, None, None, "/"),
            Some(PathBuf::from(&existing))
        );
        let file = format!("{base}/file.txt");
        assert_eq!(
            resolver.get_root(&file, None, None, "/"),
            Some(PathBuf::from(base))
        );
        let missing = format!("{base}/nope");
        assert_eq!(
            resolver.get_root(&missing, None, None, "/"),
            Some(PathBuf::from(base))
        );
        assert_eq!(
            resolver.get_root("/a/b/", None, None, "/"),
            Some(PathBuf::from("/a/b/"))
        );
    }

    #[test]
    fn test_env_and_tilde_expansion_before_resolution() {
        let resolver = PathResolver::new(PathStyle::Posix)
            .with_env(env(&[("HOME", "/home/me"), ("DATA", "/srv/data")]));
        assert_eq!(
            resolver.get_root("~/", None, None, "/"),
            Some(PathBuf::from("/home/me/"))
        );
        assert_eq!(
            resolver.get_root("$DATA/", None, None, "/"),
            Some(PathBuf::from("/srv/data/"))
        );
        assert_eq!(resolver.expand("~user/x"), "~user/x");
    }

    #[test]
    fn test_root_hint_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        fs::create_dir_all(project.join(".git")).unwrap();
        fs::create_dir_all(project.join("src").join("deep")).unwrap();
        let file = project.join("src").join("deep").join("lib.rs");
        let file = file.to_str().unwrap();
        let resolver = PathResolver::new(PathStyle::Posix);

        assert_eq!(
            resolver.get_root("", Some(".git"), Some(file), "/"),
            Some(project.clone())
        );
        assert_eq!(
            resolver.get_root("", Some("no-such-marker-file"), Some(file), "/"),
            None
        );
        assert_eq!(
            resolver.get_root("", Some(""), Some(file), "/tmp"),
            Some(PathBuf::from("/tmp"))
        );
        assert_eq!(
            resolver.get_root("./", Some(".git"), Some(file), "/"),
            Some(project.join("src").join("deep"))
        );
    }

    #[test]
    fn test_current_file_then_cwd() {
        let resolver = PathResolver::new(PathStyle::Posix);
        assert_eq!(
            resolver.get_root("", None, Some("/proj/src/main.rs"), "/cwd"),
            Some(PathBuf::from("/proj/src"))
        );
        assert_eq!(
            resolver.get_root("lib/", None, None, "/cwd"),
            Some(PathBuf::from("/cwd/lib"))
        );
        assert_eq!(resolver.get_root("", None, None, "relative"), None);
    }

    #[test]
    fn test_filter_files() {
        assert_eq!(
            filter_files([Some(".a"), Some(".b"), None], false, &ExcludeSet::default()),
            vec![".a", ".b"]
        );
        assert_eq!(
            filter_files(
                [Some("a.js"), Some("b.ts")],
                true,
                &ExcludeSet::new(&["*.js"])
            ),
            vec!["b.ts"]
        );
        assert_eq!(
            filter_files([Some(".hidden"), Some(""), Some("shown")], true, &ExcludeSet::default()),
            vec!["shown"]
        );
    }

    #[test]
    fn test_get_items_from_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src").join("nested")).unwrap();
        fs::write(dir.path().join("src").join("main.rs"), "").unwrap();
        fs::write(dir.path().join("src").join("nested").join("x.js"), "").unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();

        let flat = get_items_from_root(dir.path(), dir.path(), false, &ExcludeSet::default());
        assert_eq!(
            flat,
            vec![
                FileItem {
                    name: "README.md".into(),
                    is_dir: false
                },
                FileItem {
                    name: "src".into(),
                    is_dir: true
                },
            ]
        );

        let deep = get_items_from_root(dir.path(), dir.path(), true, &ExcludeSet::new(&["*.js"]));
        let names: Vec<&str> = deep.iter().map(|item| item.name.as_str()).collect();
        assert!(names.contains(&"src/main.rs"), "got {names:?}");
        assert!(names.contains(&"src/nested"), "got {names:?}");
        assert!(!names.iter().any(|name| name.ends_with("x.js")), "got {names:?}");

        let missing = get_items_from_root(
            &dir.path().join("missing"),
            dir.path(),
            false,
            &ExcludeSet::default(),
        );
        assert!(missing.is_empty());
    }

    #[test]
    fn test_path_fragment() {
        assert_eq!(path_fragment("open ./src/ma", PathStyle::Posix), Some("./src/ma"));
        assert_eq!(path_fragment("x = \"/usr/", PathStyle::Posix), Some("/usr/"));
        assert_eq!(path_fragment("just words", PathStyle::Posix), None);
        assert_eq!(path_fragment("see https://a/b", PathStyle::Posix), None);
        assert_eq!(path_fragment("C:\\Us", PathStyle::Posix), None);
        assert_eq!(path_fragment("C:\\Us", PathStyle::DriveLetter), Some("C:\\Us"));
        assert_eq!(path_fragment("", PathStyle::Posix), None);
    }
}
