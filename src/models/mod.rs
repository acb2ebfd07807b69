pub mod booking;
pub mod content;
pub mod movie;
pub mod payment;
pub mod seat;
pub mod showtime;
pub mod ticket_price;
pub mod user;

pub use booking::{Booking, BookingSeat};
pub use content::{Bookmark, FestivalEvent, News, Promotion};
pub use movie::{Genre, Movie};
pub use payment::Payment;
pub use seat::SeatClass;
pub use showtime::Showtime;
pub use ticket_price::TicketPrice;
pub use user::User;
