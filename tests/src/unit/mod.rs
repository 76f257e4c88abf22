mod session_tests;
mod sign_in_tests;
