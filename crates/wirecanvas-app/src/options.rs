//! Command-line options.

use std::path::PathBuf;

use wirecanvas_core::{CanvasConfig, Graph};

use crate::session::{self, Session};
use crate::{AppError, AppResult};

pub const USAGE: &str = "usage: wirecanvas [--config FILE] [--graph FILE] [--headless [SESSION]]";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Canvas configuration JSON.
    pub config: Option<PathBuf>,
    /// Graph JSON to open. A demo graph is used otherwise.
    pub graph: Option<PathBuf>,
    /// Replay a session without opening a window.
    pub headless: bool,
    /// Session JSON for headless mode. The built-in demo otherwise.
    pub session: Option<PathBuf>,
}

impl Options {
    pub fn parse<I, S>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut options = Options::default();
        let mut args = args.into_iter().map(Into::into).peekable();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => options.config = Some(value(&mut args, &arg)?.into()),
                "--graph" => options.graph = Some(value(&mut args, &arg)?.into()),
                "--headless" => {
                    options.headless = true;
                    if args.peek().is_some_and(|next| !next.starts_with("--")) {
                        options.session = args.next().map(PathBuf::from);
                    }
                }
                "-h" | "--help" => return Err(AppError::Usage(USAGE.to_string())),
                other => {
                    return Err(AppError::Usage(format!("unexpected argument '{other}'\n{USAGE}")));
                }
            }
        }
        Ok(options)
    }

    pub fn load_config(&self) -> AppResult<CanvasConfig> {
        match &self.config {
            Some(path) => Ok(CanvasConfig::load(path)?),
            None => Ok(CanvasConfig::default()),
        }
    }

    pub fn load_graph(&self) -> AppResult<Graph> {
        match &self.graph {
            Some(path) => Ok(Graph::from_json(&std::fs::read_to_string(path)?)?),
            None => Ok(session::demo_graph()),
        }
    }

    pub fn load_session(&self) -> AppResult<Session> {
        match &self.session {
            Some(path) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
            None => Ok(session::demo_session()),
        }
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> AppResult<String> {
    args.next()
        .ok_or_else(|| AppError::Usage(format!("{flag} needs a value\n{USAGE}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_flags() {
        let options = Options::parse(["--graph", "g.json", "--headless", "s.json"]).unwrap();
        assert_eq!(options.graph, Some(PathBuf::from("g.json")));
        assert!(options.headless);
        assert_eq!(options.session, Some(PathBuf::from("s.json")));

        let options = Options::parse(["--headless", "--config", "c.json"]).unwrap();
        assert!(options.headless);
        assert_eq!(options.session, None);
        assert_eq!(options.config, Some(PathBuf::from("c.json")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Options::parse(["--graph"]), Err(AppError::Usage(_))));
        assert!(matches!(Options::parse(["--bogus"]), Err(AppError::Usage(_))));
        assert!(matches!(Options::parse(["--help"]), Err(AppError::Usage(_))));
    }

    #[test]
    fn test_defaults_without_files() {
        let options = Options::default();
        assert_eq!(options.load_config().unwrap(), CanvasConfig::default());
        assert!(options.load_graph().unwrap().node_count() > 0);
        assert!(!options.load_session().unwrap().steps.is_empty());
    }

    #[test]
    fn test_load_graph_file() {
        let mut graph = Graph::new();
        graph.add_node(wirecanvas_core::graph::Node::new("only"));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(graph.to_json().unwrap().as_bytes()).unwrap();

        let options = Options {
            graph: Some(file.path().to_path_buf()),
            ..Options::default()
        };
        assert_eq!(options.load_graph().unwrap().node_count(), 1);
    }

    #[test]
    fn test_missing_graph_file() {
        let options = Options {
            graph: Some(PathBuf::from("/nonexistent/graph.json")),
            ..Options::default()
        };
        assert!(matches!(options.load_graph(), Err(AppError::Io(_))));
    }
}
