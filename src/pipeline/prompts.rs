//! Prompt construction for the two reasoning calls.

/// Prompt asking the reasoning capability to pull structured attributes out
/// of a free-text query.
pub fn attribute_prompt(query_text: &str) -> String {
    format!(
        "Extract key attributes from this insurance query:\n\
         \"{query_text}\"\n\
         Return valid JSON with: age, gender, procedure, location, policy_duration"
    )
}

/// Prompt asking for a structured decision over the retrieved clauses.
pub fn decision_prompt(query_text: &str, clauses: &[String]) -> String {
    let clause_list = clauses
        .iter()
        .map(|clause| format!("- {clause}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an insurance policy decision engine.\n\
         \n\
         Question: \"{query_text}\"\n\
         Relevant clauses:\n\
         {clause_list}\n\
         \n\
         Analyze carefully:\n\
         1. Use the most relevant clause(s).\n\
         2. If waiting period or eligibility is clear, return it.\n\
         3. If information is missing, mark \"Needs Review\".\n\
         \n\
         Return ONLY JSON:\n\
         {{\n\
           \"decision\": \"Approved\"/\"Rejected\"/\"Needs Review\",\n\
           \"amount\": number or null,\n\
           \"justification\": \"short explanation\",\n\
           \"referenced_clauses\": [\"...\"]\n\
         }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_prompt_embeds_the_query() {
        let prompt = attribute_prompt("knee surgery in Pune, 46M");
        assert!(prompt.contains("knee surgery in Pune, 46M"));
        assert!(prompt.contains("policy_duration"));
    }

    #[test]
    fn decision_prompt_lists_each_clause() {
        let clauses = vec!["clause a".to_string(), "clause b".to_string()];
        let prompt = decision_prompt("am I covered?", &clauses);
        assert!(prompt.contains("- clause a"));
        assert!(prompt.contains("- clause b"));
        assert!(prompt.contains("\"decision\""));
    }
}
