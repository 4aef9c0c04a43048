pub mod announcements;
pub mod notifier;
pub mod play;
pub mod profiles;
pub mod registration;
pub mod reminder;
pub mod scheduler;
pub mod sponsorship;
pub mod status;

pub use announcements::Broadcaster;
pub use notifier::{DirectCastNotifier, FanOutReport, NotificationContext, NotificationKind, Notifier};
pub use play::{submit_move, MoveParams};
pub use profiles::ProfileService;
pub use registration::{register, RegisterParams};
pub use reminder::{spawn_reminder_service, ReminderService};
pub use scheduler::{run_scheduler_tick, spawn_scheduler, SchedulerService, TickReport};
pub use sponsorship::{create_tournament, handle_mention, CreateTournamentParams};
pub use status::{get_status, GameStatus};
