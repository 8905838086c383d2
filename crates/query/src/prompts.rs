use crate::classifier::Classification;
use std::fmt::Write;

/// The six rules every model-bound prompt opens with. They bind the model to
/// the supplied context and are part of the observable behavior.
pub(crate) const ANTI_HALLUCINATION_PREAMBLE: &str = "CRITICAL INSTRUCTIONS:\n\
1. Answer ONLY based on the code provided in the context below\n\
2. If the answer requires code not in the context, explicitly say: 'This information is not available in the current context'\n\
3. When referencing code, cite specific function names, file paths, or line indicators\n\
4. Do NOT invent function names, variables, or code behavior\n\
5. If you're uncertain, express that uncertainty clearly\n\
6. Distinguish between what you see in the code vs. what you infer\n\n";

fn symbols_list(symbols: &[String]) -> String {
    format!("[{}]", symbols.join(", "))
}

fn with_preamble(body: String) -> String {
    format!("{ANTI_HALLUCINATION_PREAMBLE}{body}")
}

pub(crate) fn understanding(query: &str, class: &Classification) -> String {
    let mut body = String::new();
    if !class.symbols.is_empty() {
        let _ = writeln!(body, "SYMBOLS MENTIONED: {}", symbols_list(&class.symbols));
    }
    if !class.keywords.is_empty() {
        let _ = writeln!(body, "KEY TERMS: {}", symbols_list(&class.keywords));
    }
    let _ = writeln!(body, "\nQUERY TYPE: {}", class.intent);
    let _ = writeln!(body, "CONFIDENCE: {:.2}\n", class.confidence);
    let _ = writeln!(body, "USER QUESTION: {query}");
    with_preamble(body)
}

pub(crate) fn implementation(query: &str, symbols: &[String], relevant_files: &[String]) -> String {
    with_preamble(format!(
        "TASK: Provide implementation guidance for: {query}\n\n\
INSTRUCTIONS:\n\
1. ONLY reference code that is explicitly shown in the provided context\n\
2. If the context doesn't contain the necessary code, say \"The relevant code is not in the current context\"\n\
3. Focus on implementation details, key functions, and control flow\n\
4. Cite specific line numbers or function names from the context\n\
5. Do NOT invent or assume code that isn't shown\n\n\
SYMBOLS MENTIONED: {}\n\
RELEVANT FILES: {}\n\n\
Question: {query}",
        symbols_list(symbols),
        symbols_list(relevant_files),
    ))
}

pub(crate) fn architecture(query: &str, call_graph_info: &str) -> String {
    with_preamble(format!(
        "TASK: Explain the architecture for: {query}\n\n\
CALL GRAPH:\n{call_graph_info}\n\n\
INSTRUCTIONS:\n\
1. Base your analysis ONLY on the code shown in the context and call graph above\n\
2. Identify architectural patterns (MVC, layering, dependency injection, etc.)\n\
3. Describe component relationships and data flow\n\
4. Highlight design decisions evident from the code structure\n\
5. If you cannot determine something from the context, explicitly state that\n\
6. Do NOT make assumptions about code you cannot see\n\n\
Question: {query}"
    ))
}

pub(crate) fn debug(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Debug analysis for: {query}\n\n\
INSTRUCTIONS:\n\
1. Analyze the code in the context for potential issues related to the query\n\
2. Look for common error patterns: null checks, off-by-one errors, race conditions, etc.\n\
3. Suggest specific fixes with exact function/variable names from the context\n\
4. If the problematic code isn't in the context, say so explicitly\n\
5. Provide step-by-step debugging approach\n\
6. Do NOT speculate about code you cannot see\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn comparison(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Compare: {}\n\n\
INSTRUCTIONS:\n\
1. Compare ONLY based on code visible in the provided context\n\
2. Highlight similarities and differences in:\n\
   - Purpose and functionality\n\
   - Implementation approach\n\
   - Parameters and return types\n\
   - Error handling\n\
   - Performance characteristics (if evident)\n\
3. Use specific examples from the context\n\
4. If either entity is not fully visible in the context, state what information is missing\n\
5. Do NOT make assumptions about unseen code\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn refactoring(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Refactoring suggestions for: {query}\n\n\
INSTRUCTIONS:\n\
1. Analyze the code in the context for refactoring opportunities\n\
2. Look for: code duplication, long functions, deep nesting, unclear naming, tight coupling\n\
3. Suggest specific improvements with reference to actual code in the context\n\
4. Explain the benefits of each suggestion\n\
5. Prioritize suggestions by impact\n\
6. Base suggestions ONLY on visible code - if context is insufficient, say so\n\
7. Do NOT invent problems that don't exist in the shown code\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn performance(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Performance analysis for: {query}\n\n\
INSTRUCTIONS:\n\
1. Analyze the code in context for performance characteristics\n\
2. Look for: loops with nested operations, repeated allocations, unnecessary copies, inefficient algorithms\n\
3. Consider: time complexity, space complexity, I/O operations, concurrency\n\
4. Suggest specific optimizations referencing actual code\n\
5. Explain trade-offs (readability vs performance)\n\
6. Base analysis ONLY on visible code\n\
7. Do NOT speculate about performance without seeing the actual implementation\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn data_flow(query: &str, call_flow: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Trace data flow for: {query}\n\n\
CALL FLOW:\n{call_flow}\n\n\
INSTRUCTIONS:\n\
1. Trace how data flows through the functions in the context\n\
2. Identify transformations, validations, and state changes\n\
3. Note where data enters and exits the system\n\
4. Highlight any data validation or sanitization\n\
5. Use actual variable/parameter names from the context\n\
6. If the full data path isn't visible, clearly state what's missing\n\
7. Do NOT invent data flow that isn't shown\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn security(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Security analysis for: {query}\n\n\
INSTRUCTIONS:\n\
1. Analyze code in context for security concerns\n\
2. Check for: input validation, injection vulnerabilities, authentication/authorization, sensitive data handling\n\
3. Identify specific security issues with line references\n\
4. Suggest concrete fixes using actual code structure\n\
5. Prioritize by severity\n\
6. Base analysis ONLY on visible code\n\
7. Do NOT flag issues that don't exist in the shown code\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn documentation(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Document the code for: {query}\n\n\
INSTRUCTIONS:\n\
1. Explain the purpose and behavior based ONLY on code in the context\n\
2. Document parameters, return values, and side effects\n\
3. Note any important edge cases or error handling\n\
4. Use clear, concise language\n\
5. If the full implementation isn't visible, note what documentation is incomplete\n\
6. Do NOT document behavior you cannot verify from the code\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn example(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Provide usage examples for: {query}\n\n\
INSTRUCTIONS:\n\
1. Create examples based on the actual function signatures in the context\n\
2. Show typical use cases with realistic parameters\n\
3. Include error handling examples if relevant\n\
4. Explain what each example demonstrates\n\
5. Use actual types and function names from the context\n\
6. If the function signature isn't fully visible, state what information is needed\n\
7. Do NOT create examples for functions you cannot see\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

pub(crate) fn testing(query: &str, symbols: &[String]) -> String {
    with_preamble(format!(
        "TASK: Testing guidance for: {query}\n\n\
INSTRUCTIONS:\n\
1. Suggest test cases based on the actual implementation in the context\n\
2. Identify edge cases, error conditions, and boundary values\n\
3. Recommend mocking strategies for dependencies\n\
4. Structure tests logically (arrange-act-assert)\n\
5. Use actual function signatures and types from the context\n\
6. If the implementation isn't fully visible, note what test coverage is uncertain\n\
7. Do NOT suggest tests for behavior you cannot verify\n\n\
SYMBOLS: {}\n\n\
Question: {query}",
        symbols_list(symbols),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Intent;

    fn classification(symbols: &[&str]) -> Classification {
        Classification {
            intent: Intent::Understanding,
            confidence: 0.85,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            keywords: vec!["retry".to_string()],
            entities: vec![],
            priority: 3,
            needs_context: true,
            reasoning: "test".to_string(),
        }
    }

    #[test]
    fn every_prompt_opens_with_the_six_rules() {
        let symbols = vec!["authenticate_user".to_string()];
        let prompts = [
            understanding("q", &classification(&["authenticate_user"])),
            implementation("q", &symbols, &[]),
            architecture("q", "info"),
            debug("q", &symbols),
            comparison("q", &symbols),
            refactoring("q", &symbols),
            performance("q", &symbols),
            data_flow("q", "flow", &symbols),
            security("q", &symbols),
            documentation("q", &symbols),
            example("q", &symbols),
            testing("q", &symbols),
        ];
        for prompt in prompts {
            assert!(prompt.starts_with("CRITICAL INSTRUCTIONS:"));
            assert!(prompt.contains("Do NOT invent function names, variables, or code behavior"));
            assert!(prompt.contains("what you see in the code vs. what you infer"));
        }
    }

    #[test]
    fn understanding_prompt_carries_classification_metadata() {
        let prompt = understanding(
            "how does retry work?",
            &classification(&["retry_fetch"]),
        );
        assert!(prompt.contains("SYMBOLS MENTIONED: [retry_fetch]"));
        assert!(prompt.contains("QUERY TYPE: Understanding"));
        assert!(prompt.contains("CONFIDENCE: 0.85"));
        assert!(prompt.contains("USER QUESTION: how does retry work?"));
    }

    #[test]
    fn debug_prompt_names_the_task() {
        let prompt = debug("why does login fail?", &["login_endpoint".to_string()]);
        assert!(prompt.contains("TASK: Debug analysis for: why does login fail?"));
        assert!(prompt.contains("SYMBOLS: [login_endpoint]"));
    }
}
