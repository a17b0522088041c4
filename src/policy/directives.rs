//! Syntactic recognition of the fixed directive set.
//!
//! Directives are matched with regular expressions over comment-free code,
//! so arguments and optional arguments may span line breaks. There is no
//! macro expansion: `\newcommand{\fig}[1]{\includegraphics{#1}}` followed by
//! `\fig{plot}` is not seen as a graphics reference. Only the brace forms are
//! recognized (`\input{file}`, not `\input file`).

use regex_lite::Regex;

/// One recognized directive with its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `\input{x}`, `\include{x}`, `\subfile{x}`.
    Input(&'a str),
    /// `\includegraphics[opts]{x}`.
    Graphics(&'a str),
    /// `\graphicspath{{a/}{b/}}`.
    GraphicsPath(Vec<&'a str>),
    /// `\bibliography{a,b}` or `\addbibresource{a.bib}`.
    Bibliography(Vec<&'a str>),
    /// `\bibliographystyle{s}`.
    BibliographyStyle(&'a str),
    /// Any `\...cite...[..][..]{k1,k2}` command.
    Citation(Vec<&'a str>),
}

/// Compiled directive patterns.
///
/// Built once per resolver and passed around explicitly, so independent
/// resolutions never share matcher state.
#[derive(Debug, Clone)]
pub struct DirectiveSet {
    input: Regex,
    graphics: Regex,
    graphics_path: Regex,
    graphics_path_entry: Regex,
    bibliography: Regex,
    bib_resource: Regex,
    bib_style: Regex,
    citation: Regex,
}

impl Default for DirectiveSet {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("directive pattern is a valid constant")
}

fn split_list(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

impl DirectiveSet {
    /// Compile the directive patterns.
    pub fn new() -> Self {
        Self {
            input: compile(r"\\(?:input|include|subfile)\s*\{([^{}]+)\}"),
            graphics: compile(r"\\includegraphics\*?\s*(?:\[[^\]]*\]\s*)*\{([^{}]+)\}"),
            graphics_path: compile(r"\\graphicspath\s*\{((?:\s*\{[^{}]*\})+)\s*\}"),
            graphics_path_entry: compile(r"\{([^{}]*)\}"),
            bibliography: compile(r"\\bibliography\s*\{([^{}]+)\}"),
            bib_resource: compile(r"\\addbibresource\s*(?:\[[^\]]*\]\s*)?\{([^{}]+)\}"),
            bib_style: compile(r"\\bibliographystyle\s*\{([^{}]+)\}"),
            citation: compile(r"\\[a-zA-Z]*cite[a-zA-Z]*\*?\s*(?:\[[^\]]*\]\s*){0,2}\{([^{}]*)\}"),
        }
    }

    /// Scan one span of code for directives, in order of appearance.
    pub fn scan<'a>(&self, code: &'a str) -> Vec<Directive<'a>> {
        self.scan_located(code).into_iter().map(|(_, d)| d).collect()
    }

    /// Like [`scan`](Self::scan), with the byte offset where each directive starts.
    pub fn scan_located<'a>(&self, code: &'a str) -> Vec<(usize, Directive<'a>)> {
        if !code.contains('\\') {
            return Vec::new();
        }

        let mut found: Vec<(usize, Directive<'a>)> = Vec::new();

        for caps in self.input.captures_iter(code) {
            if let (Some(all), Some(arg)) = (caps.get(0), caps.get(1)) {
                found.push((all.start(), Directive::Input(arg.as_str().trim())));
            }
        }
        for caps in self.graphics.captures_iter(code) {
            if let (Some(all), Some(arg)) = (caps.get(0), caps.get(1)) {
                found.push((all.start(), Directive::Graphics(arg.as_str().trim())));
            }
        }
        for caps in self.graphics_path.captures_iter(code) {
            if let (Some(all), Some(arg)) = (caps.get(0), caps.get(1)) {
                let dirs = self
                    .graphics_path_entry
                    .captures_iter(arg.as_str())
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str().trim())
                    .collect();
                found.push((all.start(), Directive::GraphicsPath(dirs)));
            }
        }
        for caps in self.bibliography.captures_iter(code) {
            if let (Some(all), Some(arg)) = (caps.get(0), caps.get(1)) {
                found.push((all.start(), Directive::Bibliography(split_list(arg.as_str()))));
            }
        }
        for caps in self.bib_resource.captures_iter(code) {
            if let (Some(all), Some(arg)) = (caps.get(0), caps.get(1)) {
                found.push((all.start(), Directive::Bibliography(vec![arg.as_str().trim()])));
            }
        }
        for caps in self.bib_style.captures_iter(code) {
            if let (Some(all), Some(arg)) = (caps.get(0), caps.get(1)) {
                found.push((all.start(), Directive::BibliographyStyle(arg.as_str().trim())));
            }
        }
        for caps in self.citation.captures_iter(code) {
            if let (Some(all), Some(arg)) = (caps.get(0), caps.get(1)) {
                found.push((all.start(), Directive::Citation(split_list(arg.as_str()))));
            }
        }

        found.sort_by_key(|(start, _)| *start);
        found
    }
}
