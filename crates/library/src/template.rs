//! Output path templating for imported files.
//!
//! Turns a [`Book`] and one of its [`BookFile`]s into a library-relative path
//! using a user-configured [upon] template. The syntax follows upon's
//! Mustache-like conventions (`{{ variable }}`, `{{ value|formatter }}`),
//! extended with:
//!
//! - **`slug`**: URL-safe slug, with quotation marks stripped first so
//!   `"It"` doesn't become `-it-`.
//! - **`upper`** / **`lower`**: change case.
//! - **`truncate`**: cut to a maximum byte length at a character boundary,
//!   usable as either `truncate(value, n)` or `{{ value|truncate: n }}`.
//!
//! # Template Variables
//!
//! | Variable    | Type             | Description                                  |
//! |-------------|------------------|----------------------------------------------|
//! | `title`     | `String`         | Book title                                   |
//! | `author`    | `String`         | Authors joined with `" & "`                  |
//! | `authors`   | `List<String>`   | Authors in order (use with `{% for %}`)      |
//! | `series`    | `Option<String>` | Series name                                  |
//! | `extension` | `String`         | File extension without the dot               |
//! | `tags`      | `List<String>`   | File tags                                    |
//! | `source`    | `Option<String>` | Where the file came from                     |
//!
//! The file's extension is always appended to the rendered path, so templates
//! should not end in `.{{ extension }}`.
//!
//! # Example
//!
//! ```
//! use tome_library::PathGenerator;
//! use tome_model::{Book, BookFile};
//! # use time::OffsetDateTime;
//! # use std::path::Path;
//!
//! let file = BookFile::new("/downloads/shining.epub", 1, OffsetDateTime::now_utc(), "hash");
//! let book = Book::new("The Shining", ["Stephen King"]);
//! let generator: PathGenerator = "{{ author }}/{{ title|slug }}".parse().unwrap();
//! assert_eq!(generator.generate(&book, &file).unwrap(), Path::new("Stephen King/the-shining.epub"));
//! ```

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::path::PathBuf;
use std::str::FromStr;
use tome_config::Config;
use tome_model::{Book, BookFile};
use tome_storage::validate_path;
use tracing::instrument;
use upon::{Engine, Template, Value};

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = tome_config::DEFAULT_TEMPLATE;

/// Renders library-relative paths from book metadata and a user-defined
/// template string.
///
/// Constructed via [`FromStr`], which compiles the template eagerly so that
/// syntax errors surface at creation time rather than on the first import.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for PathGenerator {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().is_empty() {
            exn::bail!(ErrorKind::Template);
        }
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl TryFrom<&Config> for PathGenerator {
    type Error = Error;

    fn try_from(config: &Config) -> std::result::Result<Self, Self::Error> {
        config.output_template.parse()
    }
}
impl PathGenerator {
    /// Render the template for `file` of `book` and append the file's extension.
    ///
    /// Each segment is trimmed and the result is validated to stay within the
    /// library root. No length limits or collision checks are applied here.
    #[instrument(skip_all, fields(title = %book.title))]
    pub fn generate(&self, book: &Book, file: &BookFile) -> Result<PathBuf> {
        let path = self
            .template
            .render(&self.engine, Self::parameters(book, file))
            .to_string()
            .or_raise(|| ErrorKind::Template)?;
        let mut path = Self::normalize(path)?.into_os_string();
        let extension = file.extension.trim().trim_matches('.');
        if !extension.is_empty() {
            path.push(".");
            path.push(extension);
        }
        Ok(path.into())
    }

    fn normalize(s: String) -> Result<PathBuf> {
        let path = s.trim().split('/').map(str::trim).collect::<Vec<_>>().join("/");
        validate_path(&path).or_raise(|| ErrorKind::Path)
    }

    fn parameters(book: &Book, file: &BookFile) -> Value {
        let list = |items: &[String]| Value::List(items.iter().map(|s| Value::from(s.as_str())).collect());
        upon::value! {
            title: book.title.as_str(),
            author: book.joined_authors(),
            authors: list(&book.authors),
            series: book.series.as_deref(),
            extension: file.extension.as_str(),
            tags: list(&file.tags),
            source: file.source.as_deref(),
        }
    }
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Converts strings to URL-safe slugs, stripping quotation marks first.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                // Various quotation marks: '"''""„"`«»
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn upper_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", s.to_uppercase())?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn lower_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "{}", s.to_lowercase())?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> String {
        s[..s.floor_char_boundary(max_bytes)].to_string()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_formatter("upper", upper_formatter);
        engine.add_formatter("lower", lower_formatter);
        engine.add_function("truncate", truncate_to_char_boundary);
    }
}
