pub mod matches;
pub mod rounds;
pub mod tournament_registrations;
pub mod tournaments;
pub mod users;
