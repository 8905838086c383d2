use crate::error::{QueryError, Result};
use eulix_kb::KbIndex;
use regex::Regex;
use std::collections::HashSet;

/// The closed set of question intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Location,
    Usage,
    Understanding,
    Implementation,
    Architecture,
    Debug,
    Comparison,
    Dependency,
    Refactoring,
    Performance,
    DataFlow,
    Security,
    Documentation,
    Example,
    Testing,
}

impl Intent {
    pub const ALL: [Intent; 15] = [
        Intent::Location,
        Intent::Usage,
        Intent::Understanding,
        Intent::Implementation,
        Intent::Architecture,
        Intent::Debug,
        Intent::Comparison,
        Intent::Dependency,
        Intent::Refactoring,
        Intent::Performance,
        Intent::DataFlow,
        Intent::Security,
        Intent::Documentation,
        Intent::Example,
        Intent::Testing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Location => "Location",
            Intent::Usage => "Usage",
            Intent::Understanding => "Understanding",
            Intent::Implementation => "Implementation",
            Intent::Architecture => "Architecture",
            Intent::Debug => "Debug",
            Intent::Comparison => "Comparison",
            Intent::Dependency => "Dependency",
            Intent::Refactoring => "Refactoring",
            Intent::Performance => "Performance",
            Intent::DataFlow => "DataFlow",
            Intent::Security => "Security",
            Intent::Documentation => "Documentation",
            Intent::Example => "Example",
            Intent::Testing => "Testing",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRole {
    Type,
    Function,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub role: EntityRole,
}

/// Outcome of the three-level cascade.
#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
    pub symbols: Vec<String>,
    pub keywords: Vec<String>,
    pub entities: Vec<Entity>,
    pub priority: u8,
    pub needs_context: bool,
    pub reasoning: String,
}

/// One row of the level-1 pattern table. Rows are checked in order; the
/// first match wins.
struct PatternRule {
    pattern: Regex,
    intent: Intent,
    confidence: f64,
    priority: u8,
    needs_context: bool,
    reasoning: &'static str,
}

/// Question/filler words stripped before keyword scoring.
const KEYWORD_STOP_WORDS: &[&str] = &[
    "how", "does", "the", "a", "an", "is", "are", "what", "where", "when", "can", "will",
    "should", "would", "could", "this", "that", "these", "those", "of", "in", "on", "at", "to",
    "for", "with",
];

/// English words the identifier regex over-matches on.
const COMMON_WORDS: &[&str] = &[
    "the", "this", "that", "these", "those", "what", "where", "when", "why", "how", "can",
    "will", "should", "would", "could", "does", "has", "have", "been", "are",
];

pub struct Classifier {
    rules: Vec<PatternRule>,
    symbol_pattern: Regex,
    valid_symbols: HashSet<String>,
    valid_types: HashSet<String>,
}

impl Classifier {
    /// Build the cascade, seeding the symbol sets from the KB index.
    pub fn new(index: &KbIndex) -> Self {
        let mut valid_symbols: HashSet<String> = HashSet::new();
        let mut valid_types: HashSet<String> = HashSet::new();
        for name in index.functions_by_name.keys() {
            valid_symbols.insert(name.clone());
        }
        for name in index.types_by_name.keys() {
            valid_symbols.insert(name.clone());
            valid_types.insert(name.clone());
        }

        Self {
            rules: pattern_table(),
            symbol_pattern: Regex::new(
                r"\b[A-Z][a-z]+(?:[A-Z][a-z]+)*\b|\b[a-z_][a-z0-9_]*\b|\b[A-Z_][A-Z0-9_]+\b",
            )
            .expect("symbol pattern compiles"),
            valid_symbols,
            valid_types,
        }
    }

    /// Classify a question. Millisecond-scale; no I/O.
    pub fn classify(&self, query: &str) -> Result<Classification> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let query_lower = query.to_lowercase();

        let symbols = self.validate_symbols(self.extract_symbols(query));
        let entities = self.extract_entities(&symbols);
        let keywords = extract_keywords(&query_lower);

        // Level 1: ordered pattern table.
        for rule in &self.rules {
            if rule.pattern.is_match(&query_lower) {
                return Ok(Classification {
                    intent: rule.intent,
                    confidence: rule.confidence,
                    symbols,
                    keywords,
                    entities,
                    priority: rule.priority,
                    needs_context: rule.needs_context,
                    reasoning: format!("Level 1: {}", rule.reasoning),
                });
            }
        }

        // Level 2: symbol-validated analysis.
        if !symbols.is_empty() {
            if let Some(result) =
                self.level2_symbol_analysis(&query_lower, &symbols, &entities, &keywords)
            {
                return Ok(result);
            }
        }

        // Level 3: keyword groups.
        Ok(self.level3_keyword_analysis(&query_lower, symbols, entities, keywords))
    }

    fn level2_symbol_analysis(
        &self,
        query_lower: &str,
        symbols: &[String],
        entities: &[Entity],
        keywords: &[String],
    ) -> Option<Classification> {
        let make = |intent, confidence, priority, needs_context, reasoning: &str| Classification {
            intent,
            confidence,
            symbols: symbols.to_vec(),
            keywords: keywords.to_vec(),
            entities: entities.to_vec(),
            priority,
            needs_context,
            reasoning: format!("Level 2: {reasoning}"),
        };

        if symbols.len() >= 2
            && contains_any(
                query_lower,
                &["difference", "compare", "vs", "versus", "similar"],
            )
        {
            return Some(make(
                Intent::Comparison,
                0.92,
                2,
                true,
                "multiple symbols with comparison keywords",
            ));
        }

        if symbols.len() == 1 {
            if contains_any(query_lower, &["where", "find", "locate", "show"]) {
                return Some(make(
                    Intent::Location,
                    0.90,
                    5,
                    false,
                    "single symbol with location keywords",
                ));
            }
            if contains_any(
                query_lower,
                &["calls", "uses", "invokes", "called by", "used by"],
            ) {
                return Some(make(
                    Intent::Usage,
                    0.90,
                    4,
                    false,
                    "single symbol with usage keywords",
                ));
            }
            if contains_any(query_lower, &["example", "how to use", "sample"]) {
                return Some(make(
                    Intent::Example,
                    0.90,
                    2,
                    true,
                    "single symbol with example keywords",
                ));
            }
        }

        if symbols.len() > 1 {
            return Some(make(
                Intent::Understanding,
                0.85,
                3,
                true,
                "multiple symbols detected",
            ));
        }

        None
    }

    fn level3_keyword_analysis(
        &self,
        query_lower: &str,
        symbols: Vec<String>,
        entities: Vec<Entity>,
        keywords: Vec<String>,
    ) -> Classification {
        let groups: [(&[&str], Intent, f64, u8, &str); 6] = [
            (
                &[
                    "debug",
                    "error",
                    "bug",
                    "issue",
                    "problem",
                    "crash",
                    "exception",
                    "not working",
                    "fails",
                ],
                Intent::Debug,
                0.85,
                1,
                "debug keywords detected",
            ),
            (
                &[
                    "performance",
                    "slow",
                    "optimize",
                    "bottleneck",
                    "efficient",
                    "speed",
                    "memory",
                ],
                Intent::Performance,
                0.85,
                2,
                "performance keywords detected",
            ),
            (
                &[
                    "refactor",
                    "improve",
                    "clean up",
                    "restructure",
                    "simplify",
                    "better way",
                ],
                Intent::Refactoring,
                0.85,
                3,
                "refactoring keywords detected",
            ),
            (
                &["test", "unit test", "mock", "coverage", "test case"],
                Intent::Testing,
                0.85,
                3,
                "testing keywords detected",
            ),
            (
                &["implement", "add", "create", "build"],
                Intent::Implementation,
                0.80,
                2,
                "implementation keywords detected",
            ),
            (
                &["architecture", "structure", "design", "overview", "system"],
                Intent::Architecture,
                0.80,
                3,
                "architecture keywords detected",
            ),
        ];

        for (group, intent, confidence, priority, reasoning) in groups {
            if contains_any(query_lower, group) {
                return Classification {
                    intent,
                    confidence,
                    symbols,
                    keywords,
                    entities,
                    priority,
                    needs_context: true,
                    reasoning: format!("Level 3: {reasoning}"),
                };
            }
        }

        Classification {
            intent: Intent::Understanding,
            confidence: 0.75,
            symbols,
            keywords,
            entities,
            priority: 3,
            needs_context: true,
            reasoning: "Level 3: general understanding query (default)".to_string(),
        }
    }

    fn extract_symbols(&self, query: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut symbols = Vec::new();
        for m in self.symbol_pattern.find_iter(query) {
            let candidate = m.as_str();
            if COMMON_WORDS.contains(&candidate.to_lowercase().as_str()) {
                continue;
            }
            if seen.insert(candidate.to_string()) {
                symbols.push(candidate.to_string());
            }
        }
        symbols
    }

    /// With an empty KB the raw candidates pass through; otherwise only names
    /// the index actually knows survive.
    fn validate_symbols(&self, symbols: Vec<String>) -> Vec<String> {
        if self.valid_symbols.is_empty() {
            return symbols;
        }
        symbols
            .into_iter()
            .filter(|s| self.valid_symbols.contains(s))
            .collect()
    }

    fn extract_entities(&self, symbols: &[String]) -> Vec<Entity> {
        symbols
            .iter()
            .map(|symbol| {
                let role = if self.valid_types.contains(symbol) {
                    EntityRole::Type
                } else if self.valid_symbols.contains(symbol) {
                    EntityRole::Function
                } else {
                    EntityRole::Unknown
                };
                Entity {
                    name: symbol.clone(),
                    role,
                }
            })
            .collect()
    }
}

/// Level-1 rows in priority order. Debug outranks everything (errors are
/// urgent), generic Location/Usage/Architecture/Implementation come last.
fn pattern_table() -> Vec<PatternRule> {
    let rule = |pattern: &str,
                intent: Intent,
                priority: u8,
                needs_context: bool,
                reasoning: &'static str| PatternRule {
        pattern: Regex::new(pattern).expect("classifier pattern compiles"),
        intent,
        confidence: 0.95,
        priority,
        needs_context,
        reasoning,
    };

    vec![
        rule(
            r"(?i)(why\s+(is|does|doesn't)|debug|error|bug|issue|problem|not\s+working|fails?|crash|exception)",
            Intent::Debug,
            1,
            true,
            "debug/error pattern match",
        ),
        rule(
            r"(?i)(difference\s+between|compare|vs\.?|versus|similar\s+to|differs?\s+from|what's\s+the\s+difference)",
            Intent::Comparison,
            2,
            true,
            "comparison pattern match",
        ),
        rule(
            r"(?i)(example|how\s+to\s+use|usage\s+example|sample|demonstrate|show\s+me\s+how)",
            Intent::Example,
            2,
            true,
            "example/usage pattern match",
        ),
        rule(
            r"(?i)(data\s+flow|how\s+data|trace\s+data|data\s+path|value\s+propagat|passes?\s+through)",
            Intent::DataFlow,
            3,
            true,
            "data flow pattern match",
        ),
        rule(
            r"(?i)(security|vulnerable|sanitize|validation|injection|xss|csrf|authentication|authorization)",
            Intent::Security,
            1,
            true,
            "security pattern match",
        ),
        rule(
            r"(?i)(performance|slow|fast|optimize|bottleneck|efficient|speed|latency|memory\s+usage)",
            Intent::Performance,
            2,
            true,
            "performance pattern match",
        ),
        rule(
            r"(?i)(refactor|improve|optimize|clean\s+up|restructure|simplify|better\s+way)",
            Intent::Refactoring,
            3,
            true,
            "refactoring pattern match",
        ),
        rule(
            r"(?i)(depends?\s+on|dependencies|required\s+by|imports?|external|third[\s-]party)",
            Intent::Dependency,
            2,
            false,
            "dependency pattern match",
        ),
        rule(
            r"(?i)(test|unit\s+test|integration\s+test|mock|coverage|test\s+case)",
            Intent::Testing,
            3,
            true,
            "testing pattern match",
        ),
        rule(
            r"(?i)(document|comment|explain|describe|what\s+does|purpose\s+of|meant\s+to\s+do)",
            Intent::Documentation,
            3,
            true,
            "documentation pattern match",
        ),
        rule(
            r"(?i)^(where\s+(is|are|can\s+i\s+find)|find\s+the|show\s+me|locate)\s",
            Intent::Location,
            5,
            false,
            "location pattern match",
        ),
        rule(
            r"(?i)(who|what|which).*(calls?|uses?|invokes?|depends\s+on|references?)",
            Intent::Usage,
            4,
            false,
            "usage pattern match",
        ),
        rule(
            r"(?i)(architecture|overall\s+structure|high[\s-]level|system\s+design|component\s+diagram|module\s+organization)",
            Intent::Architecture,
            3,
            true,
            "architecture pattern match",
        ),
        rule(
            r"(?i)(implement|add\s+feature|create\s+new|build\s+a)",
            Intent::Implementation,
            2,
            true,
            "implementation pattern match",
        ),
    ]
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

/// Tokenize on non-identifier characters, drop stop words and short tokens,
/// and split snake_case tokens into their parts as well.
pub(crate) fn extract_keywords(query_lower: &str) -> Vec<String> {
    let mut keywords = Vec::new();
    for word in query_lower.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let word = word.trim_matches(|c| c == '"' || c == '\'');
        if word.len() <= 2 || KEYWORD_STOP_WORDS.contains(&word) {
            continue;
        }
        keywords.push(word.to_string());
        if word.contains('_') {
            for part in word.split('_') {
                if part.len() > 2 && !KEYWORD_STOP_WORDS.contains(&part) {
                    keywords.push(part.to_string());
                }
            }
        }
    }
    keywords
}
