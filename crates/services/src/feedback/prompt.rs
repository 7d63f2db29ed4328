use std::fmt::Write;

use super::orchestrator::FeedbackRequest;

/// Render the generator prompt: subject, then every question with its
/// options, the student's choice, the correct option and the stored
/// explanation.
#[must_use]
pub fn build_prompt(request: &FeedbackRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Você é um professor de {}. Um aluno acabou de concluir uma avaliação.",
        request.subject
    );
    out.push_str(
        "Para cada questão abaixo, explique em português do Brasil, de forma breve e \
         encorajadora, por que a alternativa correta está certa e, se o aluno errou, \
         onde está o engano.\n\n",
    );

    for (index, question) in request.questions.iter().enumerate() {
        let _ = writeln!(out, "Questão {}: {}", index + 1, question.prompt());
        for (option_index, option) in question.options().iter().enumerate() {
            let _ = writeln!(out, "  {}) {}", option_label(option_index), option);
        }
        let chosen = request
            .answers
            .get(index)
            .map_or_else(|| "sem resposta".to_string(), |i| option_label(i).to_string());
        let _ = writeln!(out, "Resposta do aluno: {chosen}");
        let _ = writeln!(
            out,
            "Resposta correta: {}",
            option_label(question.correct_index())
        );
        if !question.explanation().trim().is_empty() {
            let _ = writeln!(out, "Explicação de referência: {}", question.explanation());
        }
        out.push('\n');
    }

    out
}

fn option_label(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map_or('?', |i| char::from(b'A' + i))
}

#[cfg(test)]
mod tests {
    use proctor_core::model::{
        AnswerSet, Difficulty, Question, QuestionId, QuestionSet, Subject,
    };

    use super::*;

    fn request() -> FeedbackRequest {
        let questions = QuestionSet::new(vec![
            Question::new(
                QuestionId::new(1),
                "2 + 2?",
                vec!["3".into(), "4".into()],
                1,
                "Soma simples.",
                Difficulty::Easy,
            )
            .unwrap(),
            Question::new(
                QuestionId::new(2),
                "Capital do Brasil?",
                vec!["Rio".into(), "Brasília".into(), "Salvador".into()],
                1,
                "Desde 1960.",
                Difficulty::Easy,
            )
            .unwrap(),
        ])
        .unwrap();
        FeedbackRequest {
            subject: Subject::new("Matemática").unwrap(),
            questions,
            answers: AnswerSet::from_raw(&[1, 2]).unwrap(),
        }
    }

    #[test]
    fn prompt_lists_every_question_with_choices() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("professor de Matemática"));
        assert!(prompt.contains("Questão 1: 2 + 2?"));
        assert!(prompt.contains("  C) Salvador"));
        assert!(prompt.contains("Resposta do aluno: C"));
        assert_eq!(prompt.matches("Resposta correta: B").count(), 2);
        assert!(prompt.contains("Explicação de referência: Soma simples."));
        assert!(prompt.contains("Explicação de referência: Desde 1960."));
    }

    #[test]
    fn labels_run_past_the_alphabet() {
        assert_eq!(option_label(0), 'A');
        assert_eq!(option_label(25), 'Z');
        assert_eq!(option_label(26), '?');
    }
}
