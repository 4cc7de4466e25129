pub mod hall;
pub mod genre;
pub mod actor;
pub mod play;
pub mod performance;
pub mod order;
pub mod ticket;
pub mod user;

pub use hall::{NewTheatreHall, TheatreHall};
pub use genre::{Genre, NewGenre};
pub use actor::{Actor, NewActor};
pub use play::{Play, PlayDetail, PlayFilter, PlayWrite};
pub use performance::{Performance, PerformanceDetail, PerformanceFilter, PerformanceSummary, PerformanceWrite, TakenPlace};
pub use order::{Order, OrderDetail, OrderPage, Page};
pub use ticket::{NewTicket, Ticket, TicketDetail};
pub use user::{NewUser, User};
