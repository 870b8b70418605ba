pub mod seird;
