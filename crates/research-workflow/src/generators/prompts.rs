//! Prompt templates for the research generators

use chrono::Utc;

/// Prompt templates for the LLM-backed generators
pub struct ResearchPrompts;

impl ResearchPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Persona creation. The reply must be a JSON object with an `analysts` array.
    pub fn analyst_instructions(topic: &str, feedback: Option<&str>, max_analysts: usize) -> String {
        format!(
            r#"You are tasked with creating a set of AI analyst personas. Follow these instructions carefully:
1. First, review the research topic: {topic}
2. Examine any editorial feedback that has been optionally provided to guide creation of the analysts:
{feedback}
3. Determine the most interesting themes based upon documents and / or feedback above.
4. Pick the top {max_analysts} themes.
5. Assign one analyst to each theme.

Respond with JSON only, no prose, in exactly this shape:
{{"analysts": [{{"name": "...", "role": "...", "affiliation": "...", "description": "..."}}]}}

Every analyst needs a distinct name and a description of at least one full sentence."#,
            topic = topic,
            feedback = feedback.unwrap_or(""),
            max_analysts = max_analysts,
        )
    }

    pub fn question_instructions(goals: &str) -> String {
        format!(
            r#"You are an analyst tasked with interviewing an expert to learn about a specific topic.

Your goal is boil down to interesting and specific insights related to your topic.
1. Interesting: Insights that people will find surprising or non-obvious.
2. Specific: Insights that avoid generalities and include specific examples from the expert.

Here is your topic of focus and set of goals: {goals}

Begin by introducing yourself using a name that fits your persona, and then ask your question.
Continue to ask questions to drill down and refine your understanding of the topic.
When you are satisfied with your understanding, complete the interview with: "Thank you so much for your help!"
Remember to stay in character throughout your response, reflecting the persona and goals provided to you."#,
            goals = goals,
        )
    }

    pub fn search_instructions() -> String {
        r#"You will be given a conversation between an analyst and an expert.

Your goal is to generate a well-structured query for use in retrieval and / or web-search related to the conversation.

First, analyze the full conversation.
Pay particular attention to the final question posed by the analyst.
Convert this final question into a well-structured web search query.

Respond with the query text only."#
            .to_string()
    }

    pub fn answer_instructions(goals: &str, context: &str) -> String {
        format!(
            r#"You are an expert being interviewed by an analyst.

For context, today's date is {date}.

Here is analyst area of focus: {goals}

Your goal is to answer a question posed by the interviewer.

To answer question, use this context:

{context}

When answering questions, follow these guidelines:
1. Use only the information provided in the context.
2. Do not introduce external information or make assumptions beyond what is explicitly stated in the context.
3. The context contain sources at the topic of each individual document.
4. Include these sources your answer next to any relevant statements. For example, for source # 1 use [1].
5. List your sources in order at the bottom of your answer. [1] Source 1, [2] Source 2, etc
6. If the source is: <Document source="assistant/docs/llama3_1.pdf" page="7"/> then just list:

[1] assistant/docs/llama3_1.pdf, page 7

And skip the addition of the brackets as well as the Document source preamble in your citation."#,
            date = Self::current_date(),
            goals = goals,
            context = context,
        )
    }

    pub fn section_writer_instructions(focus: &str) -> String {
        format!(
            r#"You are an expert technical writer.

Your task is to create a short, easily digestible section of a report based on a set of source documents.

1. Analyze the content of the source documents:
- The name of each source document is at the start of the document, with the <Document tag.

2. Create a report structure using markdown formatting:
- Use ## for the section title
- Use ### for sub-section headers

3. Write the report following this structure:
a. Title (## header)
b. Summary (### header)
c. Sources (### header)

4. Make your title engaging based upon the focus area of the analyst:
{focus}

5. For the summary section:
- Set up summary with general background / context related to the focus area of the analyst
- Emphasize what is novel, interesting, or surprising about insights gathered from the interview
- Create a numbered list of source documents, as you use them
- Do not mention the names of interviewers or experts
- Aim for approximately 400 words maximum
- Use numbered sources in your report (e.g., [1], [2]) based on information from source documents

6. In the Sources section:
- Include all sources used in your report
- Provide full links to relevant websites or specific document paths
- Separate each source by a newline. Use two spaces at the end of each line to create a newline in Markdown.
- It will look like:

### Sources
[1] Link or Document name
[2] Link or Document name

7. Be sure to combine sources. There should be no redundant sources.

8. Final review:
- Ensure the report follows the required structure
- Include no preamble before the title of the report
- Check that all guidelines have been followed"#,
            focus = focus,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyst_instructions_embed_inputs() {
        let prompt = ResearchPrompts::analyst_instructions("Design patterns", Some("add a startup CTO"), 4);
        assert!(prompt.contains("Design patterns"));
        assert!(prompt.contains("add a startup CTO"));
        assert!(prompt.contains("top 4 themes"));
        assert!(prompt.contains(r#"{"analysts": [{"name""#));
    }

    #[test]
    fn test_question_instructions_carry_sign_off() {
        let prompt = ResearchPrompts::question_instructions("Name: Ada");
        assert!(prompt.contains("Name: Ada"));
        assert!(prompt.contains(crate::domain::SIGN_OFF_PHRASE));
    }

    #[test]
    fn test_answer_instructions_include_date_and_context() {
        let prompt = ResearchPrompts::answer_instructions("goals", "<Document href=\"x\">");
        assert!(prompt.contains(&ResearchPrompts::current_date()));
        assert!(prompt.contains("<Document href=\"x\">"));
    }

    #[test]
    fn test_section_writer_instructions() {
        let prompt = ResearchPrompts::section_writer_instructions("scalability");
        assert!(prompt.contains("scalability"));
        assert!(prompt.contains("### Sources"));
        assert!(!ResearchPrompts::search_instructions().is_empty());
    }
}
