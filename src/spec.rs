//! GR(1) specifications.
//!
//! A [`Specification`] is built once through [`SpecBuilder`] (or parsed from
//! the text format by [`Specification::parse`]) and never mutated afterwards.
//!
//! # Text format
//!
//! ```text
//! # comment
//! [ENV_VARS]
//! request: bool
//!
//! [SYS_VARS]
//! grant: 0..2
//!
//! [SYS_SAFETY]
//! request -> X grant != 0
//!
//! [SYS_PROGRESS]
//! grant = 2
//!
//! [OPTIONS]
//! moore = false
//! qinit = \A \E
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::domain::{Domain, Player, Registry};
use crate::error::{Error, Result};
use crate::formula::Formula;

/// Quantification of the initial condition.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum InitMode {
    /// `\A \E`: for every initial input, the system picks an initial output.
    #[default]
    ForallExists,
    /// `\E \A`: one initial output works for every initial input.
    ExistsForall,
    /// `\A \A`: every initial state must be winning.
    ForallForall,
    /// `\E \E`: some initial state is winning.
    ExistsExists,
}

impl fmt::Display for InitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InitMode::ForallExists => "\\A \\E",
            InitMode::ExistsForall => "\\E \\A",
            InitMode::ForallForall => "\\A \\A",
            InitMode::ExistsExists => "\\E \\E",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for InitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        match compact.as_str() {
            "\\A\\E" => Ok(InitMode::ForallExists),
            "\\E\\A" => Ok(InitMode::ExistsForall),
            "\\A\\A" => Ok(InitMode::ForallForall),
            "\\E\\E" => Ok(InitMode::ExistsExists),
            _ => Err(format!("unknown initial mode '{}'", s)),
        }
    }
}

/// The six labeled formula sets of a GR(1) specification.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Section {
    EnvInit,
    EnvSafety,
    EnvProgress,
    SysInit,
    SysSafety,
    SysProgress,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::EnvInit,
        Section::EnvSafety,
        Section::EnvProgress,
        Section::SysInit,
        Section::SysSafety,
        Section::SysProgress,
    ];

    pub fn player(self) -> Player {
        match self {
            Section::EnvInit | Section::EnvSafety | Section::EnvProgress => Player::Env,
            Section::SysInit | Section::SysSafety | Section::SysProgress => Player::Sys,
        }
    }

    pub fn is_safety(self) -> bool {
        matches!(self, Section::EnvSafety | Section::SysSafety)
    }

    fn index(self) -> usize {
        self as usize
    }

    fn header(self) -> &'static str {
        match self {
            Section::EnvInit => "ENV_INIT",
            Section::EnvSafety => "ENV_SAFETY",
            Section::EnvProgress => "ENV_PROGRESS",
            Section::SysInit => "SYS_INIT",
            Section::SysSafety => "SYS_SAFETY",
            Section::SysProgress => "SYS_PROGRESS",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::EnvInit => "environment initial",
            Section::EnvSafety => "environment safety",
            Section::EnvProgress => "environment progress",
            Section::SysInit => "system initial",
            Section::SysSafety => "system safety",
            Section::SysProgress => "system progress",
        };
        write!(f, "{}", s)
    }
}

/// Incremental construction of a [`Specification`].
///
/// Declarations are checked immediately; formulas are parsed and validated
/// together in [`build`][SpecBuilder::build].
#[derive(Debug, Clone, Default)]
pub struct SpecBuilder {
    registry: Registry,
    formulas: [Vec<String>; 6],
    moore: bool,
    init_mode: InitMode,
}

impl SpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env_var(&mut self, name: &str, domain: Domain) -> Result<&mut Self> {
        self.registry.declare(name, domain, Player::Env)?;
        Ok(self)
    }

    pub fn sys_var(&mut self, name: &str, domain: Domain) -> Result<&mut Self> {
        self.registry.declare(name, domain, Player::Sys)?;
        Ok(self)
    }

    pub fn formula(&mut self, section: Section, text: &str) -> &mut Self {
        self.formulas[section.index()].push(text.to_string());
        self
    }

    pub fn env_init(&mut self, text: &str) -> &mut Self {
        self.formula(Section::EnvInit, text)
    }

    pub fn env_safety(&mut self, text: &str) -> &mut Self {
        self.formula(Section::EnvSafety, text)
    }

    pub fn env_progress(&mut self, text: &str) -> &mut Self {
        self.formula(Section::EnvProgress, text)
    }

    pub fn sys_init(&mut self, text: &str) -> &mut Self {
        self.formula(Section::SysInit, text)
    }

    pub fn sys_safety(&mut self, text: &str) -> &mut Self {
        self.formula(Section::SysSafety, text)
    }

    pub fn sys_progress(&mut self, text: &str) -> &mut Self {
        self.formula(Section::SysProgress, text)
    }

    pub fn moore(&mut self, moore: bool) -> &mut Self {
        self.moore = moore;
        self
    }

    pub fn init_mode(&mut self, init_mode: InitMode) -> &mut Self {
        self.init_mode = init_mode;
        self
    }

    fn validate(&self, section: Section, formula: &Formula) -> Result<()> {
        formula.check(&self.registry)?;
        let invalid = |reason: String| Error::InvalidFormula {
            section: section.to_string(),
            formula: formula.text().to_string(),
            reason,
        };
        let (_, next) = formula.expr().references();
        if !section.is_safety() {
            if let Some(name) = next.iter().next() {
                return Err(invalid(format!("refers to the next value of '{}'", name)));
            }
        } else if section.player() == Player::Env {
            if let Some(name) = next
                .iter()
                .find(|name| self.registry.get(name).is_some_and(|v| v.player == Player::Sys))
            {
                return Err(invalid(format!(
                    "refers to the next value of system variable '{}'",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate every formula, producing the immutable specification.
    pub fn build(&self) -> Result<Specification> {
        let mut formulas: [Vec<Formula>; 6] = Default::default();
        for section in Section::ALL {
            for text in &self.formulas[section.index()] {
                let formula = Formula::parse(text)?;
                self.validate(section, &formula)?;
                formulas[section.index()].push(formula);
            }
        }
        let spec = Specification {
            registry: self.registry.clone(),
            formulas,
            moore: self.moore,
            init_mode: self.init_mode,
        };
        log::debug!(
            "built specification: {} variables, {} formulas",
            spec.registry.variables().len(),
            spec.formulas.iter().map(|fs| fs.len()).sum::<usize>()
        );
        Ok(spec)
    }
}

/// Immutable GR(1) specification.
#[derive(Debug, Clone)]
pub struct Specification {
    registry: Registry,
    formulas: [Vec<Formula>; 6],
    moore: bool,
    init_mode: InitMode,
}

impl Specification {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn formulas(&self, section: Section) -> &[Formula] {
        &self.formulas[section.index()]
    }

    /// Whether the system must commit to its move before seeing the input.
    pub fn moore(&self) -> bool {
        self.moore
    }

    pub fn init_mode(&self) -> InitMode {
        self.init_mode
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse the sectioned text format.
    pub fn parse(text: &str) -> Result<Self> {
        enum Block {
            Vars(Player),
            Formulas(Section),
            Options,
        }

        let mut builder = SpecBuilder::new();
        let mut block = None;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let format_error = |message: String| Error::SpecFormat {
                line: line_no,
                message,
            };
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                block = Some(match header.trim() {
                    "ENV_VARS" => Block::Vars(Player::Env),
                    "SYS_VARS" => Block::Vars(Player::Sys),
                    "OPTIONS" => Block::Options,
                    other => Block::Formulas(
                        Section::ALL
                            .into_iter()
                            .find(|s| s.header() == other)
                            .ok_or_else(|| format_error(format!("unknown section [{}]", other)))?,
                    ),
                });
                continue;
            }

            match &block {
                None => return Err(format_error("content before the first section".to_string())),
                Some(Block::Vars(player)) => {
                    let (name, domain) = line
                        .split_once(':')
                        .ok_or_else(|| format_error(format!("expected 'name: domain', found '{}'", line)))?;
                    let domain = parse_domain(domain.trim()).map_err(format_error)?;
                    match player {
                        Player::Env => builder.env_var(name.trim(), domain)?,
                        Player::Sys => builder.sys_var(name.trim(), domain)?,
                    };
                }
                Some(Block::Formulas(section)) => {
                    builder.formula(*section, line);
                }
                Some(Block::Options) => {
                    let (key, value) = line
                        .split_once('=')
                        .ok_or_else(|| format_error(format!("expected 'key = value', found '{}'", line)))?;
                    match (key.trim(), value.trim()) {
                        ("moore", v) => {
                            let moore = v
                                .parse::<bool>()
                                .map_err(|_| format_error(format!("expected true or false, found '{}'", v)))?;
                            builder.moore(moore);
                        }
                        ("qinit", v) => {
                            builder.init_mode(v.parse().map_err(format_error)?);
                        }
                        (k, _) => return Err(format_error(format!("unknown option '{}'", k))),
                    }
                }
            }
        }

        builder.build()
    }
}

fn parse_domain(text: &str) -> Result<Domain, String> {
    if text == "bool" || text == "boolean" {
        return Ok(Domain::Bool);
    }
    let (lo, hi) = text
        .split_once("..")
        .ok_or_else(|| format!("expected 'bool' or 'lo..hi', found '{}'", text))?;
    let bound = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid bound '{}'", s.trim()))
    };
    Ok(Domain::Int {
        min: bound(lo)?,
        max: bound(hi)?,
    })
}

impl fmt::Display for Specification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (player, header) in [(Player::Env, "ENV_VARS"), (Player::Sys, "SYS_VARS")] {
            writeln!(f, "[{}]", header)?;
            for var in self.registry.variables_of(player) {
                match var.domain {
                    Domain::Bool => writeln!(f, "{}: bool", var.name)?,
                    Domain::Int { min, max } => writeln!(f, "{}: {}..{}", var.name, min, max)?,
                }
            }
            writeln!(f)?;
        }
        for section in Section::ALL {
            if self.formulas(section).is_empty() {
                continue;
            }
            writeln!(f, "[{}]", section.header())?;
            for formula in self.formulas(section) {
                writeln!(f, "{}", formula)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "[OPTIONS]")?;
        writeln!(f, "moore = {}", self.moore)?;
        writeln!(f, "qinit = {}", self.init_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const SAMPLE: &str = r"
# two requests, one grant
[ENV_VARS]
r1: bool
r2: bool   # second client

[SYS_VARS]
g: 0..2

[ENV_SAFETY]
r1 -> X r1 || g = 1

[SYS_INIT]
g = 0

[SYS_SAFETY]
r1 && r2 -> X g != 0

[SYS_PROGRESS]
g = 1
g = 2

[OPTIONS]
moore = true
qinit = \E \A
";

    #[test]
    fn test_parse_sample() {
        let spec = Specification::parse(SAMPLE).unwrap();
        assert_eq!(spec.registry().variables().len(), 3);
        assert_eq!(spec.registry().get("g").unwrap().domain, Domain::int(0, 2));
        assert_eq!(spec.formulas(Section::SysProgress).len(), 2);
        assert!(spec.formulas(Section::EnvProgress).is_empty());
        assert!(spec.moore());
        assert_eq!(spec.init_mode(), InitMode::ExistsForall);
    }

    #[test]
    fn test_display_parses_back() {
        let spec = Specification::parse(SAMPLE).unwrap();
        let again = Specification::parse(&spec.to_string()).unwrap();
        assert_eq!(again.to_string(), spec.to_string());
    }

    #[test]
    fn test_init_mode_from_str() {
        assert_eq!("\\A \\E".parse::<InitMode>().unwrap(), InitMode::ForallExists);
        assert_eq!("\\E\\E".parse::<InitMode>().unwrap(), InitMode::ExistsExists);
        assert!("\\A".parse::<InitMode>().is_err());
        for mode in [
            InitMode::ForallExists,
            InitMode::ExistsForall,
            InitMode::ForallForall,
            InitMode::ExistsExists,
        ] {
            assert_eq!(mode.to_string().parse::<InitMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_section_kinds() {
        let safety: Vec<Section> = Section::ALL.into_iter().filter(|s| s.is_safety()).collect();
        assert_eq!(safety, [Section::EnvSafety, Section::SysSafety]);
        assert_eq!(Section::EnvProgress.player(), Player::Env);
        assert_eq!(Section::SysInit.player(), Player::Sys);
    }

    #[test]
    fn test_sys_safety_sees_everything_next() {
        let mut builder = SpecBuilder::new();
        builder.env_var("a", Domain::Bool).unwrap();
        builder.sys_var("b", Domain::Bool).unwrap();
        builder.sys_safety("X b -> X a");
        builder.build().unwrap();
    }

    #[test]
    fn test_next_in_init_rejected() {
        let mut builder = SpecBuilder::new();
        builder.env_var("a", Domain::Bool).unwrap();
        builder.env_init("X a");
        assert!(matches!(builder.build(), Err(Error::InvalidFormula { .. })));
    }

    #[test]
    fn test_next_in_progress_rejected() {
        let mut builder = SpecBuilder::new();
        builder.sys_var("b", Domain::Bool).unwrap();
        builder.sys_progress("b'");
        assert!(matches!(builder.build(), Err(Error::InvalidFormula { .. })));
    }

    #[test]
    fn test_env_safety_cannot_see_next_output() {
        let mut builder = SpecBuilder::new();
        builder.env_var("a", Domain::Bool).unwrap();
        builder.sys_var("b", Domain::Bool).unwrap();
        builder.env_safety("b -> X a");
        builder.build().unwrap();

        builder.env_safety("X b -> X a");
        match builder.build() {
            Err(Error::InvalidFormula { section, .. }) => assert_eq!(section, "environment safety"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_build_reports_unbound_and_syntax() {
        let mut builder = SpecBuilder::new();
        builder.sys_var("b", Domain::Bool).unwrap();
        builder.sys_safety("b -> X c");
        assert!(matches!(builder.build(), Err(Error::UnboundVariable { .. })));

        let mut builder = SpecBuilder::new();
        builder.sys_safety("b ->");
        assert!(matches!(builder.build(), Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut builder = SpecBuilder::new();
        builder.env_var("a", Domain::Bool).unwrap();
        assert!(matches!(
            builder.sys_var("a", Domain::int(0, 1)),
            Err(Error::DuplicateVariable(_))
        ));
    }

    #[test]
    fn test_parse_format_errors() {
        for (text, line) in [
            ("a: bool", 1),
            ("[ENV_VARS]\na bool", 2),
            ("[ENV_VARS]\na: 3", 2),
            ("[NOPE]", 1),
            ("[OPTIONS]\nmoore = maybe", 2),
            ("[OPTIONS]\n\nqinit = \\A", 3),
            ("[OPTIONS]\nspeed = 3", 2),
        ] {
            match Specification::parse(text) {
                Err(Error::SpecFormat { line: l, .. }) => assert_eq!(l, line, "in {:?}", text),
                other => panic!("unexpected {:?} for {:?}", other, text),
            }
        }
        assert!(matches!(
            Specification::parse("[ENV_VARS]\nx: 3..1"),
            Err(Error::InvalidDomain { .. })
        ));
    }
}
