//! Prompt construction for the three interview kinds.
//!
//! One parameterized module covers what used to be three separate
//! interviewer personas: the kind selects the system prompt and the
//! category set of the JSON performance report.

use iv_domain::interview::{InterviewContext, Transcript};

/// Input sent for the priming request that opens the interview.
pub const PRIMING_INPUT: &str = "Please start the interview with your first question.";

/// Suffix appended to the candidate's last answer when the warning
/// trigger has fired and the next utterance must close the interview.
pub const WRAP_UP_INSTRUCTION: &str =
    " [Please wrap up the interview with a final thank you message, no more questions.]";

const COMMON_CONDUCT: &str = "\
Ask one clear question at a time, emulating a real job interview. Only ask \
the next question after the candidate has responded. Keep a warm, \
professional tone. Never use labels such as \"Question:\", never offer \
feedback or summaries, and never put multiple questions in one turn. If the \
candidate asks for clarification, give a brief explanation without leading \
them to the answer. If they are stuck, ask them to think out loud or move \
on. If they ask for a hint, guide without giving the answer away.";

/// Build the interviewer persona prompt for a session.
pub fn interviewer_system_prompt(context: &InterviewContext) -> String {
    match context {
        InterviewContext::Role(c) => format!(
            "You are an experienced HR professional interviewing a technical \
             candidate. Assess soft skills, culture fit, and behavioral traits: \
             communication, confidence, teamwork, adaptability, motivation, \
             integrity, ownership, and situational judgement. Start with a short \
             friendly introduction of how the interview will proceed, and do not \
             explain what you are evaluating. {COMMON_CONDUCT}\n\n\
             Candidate background:\n\
             Name: {}\nRole applied for: {}\nExperience: {}\nCompany: {}\n\
             Job description: {}",
            c.name, c.role, c.experience, c.company_applying, c.job_description,
        ),
        InterviewContext::Project(c) => format!(
            "You are a senior engineer interviewing a candidate about a machine \
             learning project they built. Probe their understanding of the problem \
             framing, data handling, modeling choices, evaluation, and what they \
             would do differently in production. {COMMON_CONDUCT}\n\n\
             Project description:\n{}",
            c.description,
        ),
        InterviewContext::Repository(c) => format!(
            "You are a professional technical interviewer assessing a candidate on \
             a real project of theirs. Ground every question strictly in the \
             repository context below: its architecture and design decisions, \
             practical knowledge of the stack, and the ability to scale, optimize, \
             and maintain the system in production. {COMMON_CONDUCT}\n\n\
             Repository context:\nREADME: {}\nDependencies: {}\nSite data: {}\n\
             Description: {}",
            c.readme,
            c.dependencies.join(", "),
            c.site_data.as_deref().unwrap_or(""),
            c.description,
        ),
    }
}

/// The named percentage-scored categories of the final report, per kind.
fn report_categories(context: &InterviewContext) -> &'static [&'static str] {
    match context {
        InterviewContext::Role(_) => &[
            "Communication_skills",
            "Confidence",
            "Cultural_fit",
            "Teamwork",
            "Adaptability",
        ],
        InterviewContext::Project(_) => &[
            "Technical_knowledge",
            "Problem_solving",
            "Model_understanding",
            "Evaluation_rigor",
            "Communication_skills",
        ],
        InterviewContext::Repository(_) => &[
            "Technical_knowledge",
            "Problem_solving",
            "Coding_skills",
            "System_design",
            "Debugging_skills",
        ],
    }
}

/// Build the summary prompt: a JSON report with percentage scores per
/// category plus strengths and areas to improve.
pub fn summary_system_prompt(context: &InterviewContext, transcript: &Transcript) -> String {
    let categories = report_categories(context)
        .iter()
        .map(|c| format!("\"{c}\": \"X%\""))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "You are an interviewer assessing a candidate's performance based on the \
         interview transcript below. Produce a detailed performance report in JSON \
         with this structure (percentages reflecting your assessment):\n\
         {categories},\n\
         \"strengths\": [\"strength 1\", \"strength 2\"],\n\
         \"areasToImprove\": [\"area 1\", \"area 2\"]\n\n\
         Important:\n\
         - DO NOT explain the scores - only the percentage values.\n\
         - Include at least 2-3 specific areas where the candidate could improve.\n\n\
         Interview transcript:\n{}",
        transcript.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use iv_domain::interview::{ProjectContext, RepositoryContext, RoleContext};

    fn repo_ctx() -> InterviewContext {
        InterviewContext::Repository(RepositoryContext {
            readme: "# cache server".into(),
            dependencies: vec!["tokio".into(), "axum".into()],
            site_data: None,
            description: "an LRU cache".into(),
            interview_duration_minutes: None,
        })
    }

    #[test]
    fn repository_prompt_embeds_context() {
        let prompt = interviewer_system_prompt(&repo_ctx());
        assert!(prompt.contains("# cache server"));
        assert!(prompt.contains("tokio, axum"));
        assert!(prompt.contains("one clear question at a time"));
    }

    #[test]
    fn role_prompt_embeds_background() {
        let ctx = InterviewContext::Role(RoleContext {
            name: "Sam".into(),
            role: "Backend Engineer".into(),
            experience: "4 years".into(),
            company_applying: "Acme".into(),
            job_description: "build APIs".into(),
        });
        let prompt = interviewer_system_prompt(&ctx);
        assert!(prompt.contains("Sam"));
        assert!(prompt.contains("Backend Engineer"));
        assert!(prompt.contains("HR professional"));
    }

    #[test]
    fn summary_categories_vary_by_kind() {
        let mut transcript = Transcript::new();
        transcript.append("Q");
        transcript.answer_last("A");

        let repo = summary_system_prompt(&repo_ctx(), &transcript);
        assert!(repo.contains("System_design"));
        assert!(repo.contains("Interviewer: Q"));

        let project = summary_system_prompt(
            &InterviewContext::Project(ProjectContext {
                description: "forecasting".into(),
                interview_duration_minutes: None,
            }),
            &transcript,
        );
        assert!(project.contains("Model_understanding"));
        assert!(!project.contains("System_design"));
    }
}
