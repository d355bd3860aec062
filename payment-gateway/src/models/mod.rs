mod account;
mod dtos;
mod transaction;
mod user;

pub use account::{Account, AccountStatus};
pub use dtos::{
    AccountResponse, BalanceResponse, EWalletBalanceResponse, MetaResponse, TopUpRequest,
    TransactionResponse, WalletQuery, WebResponse,
};
pub use transaction::{
    PaymentMethod, Transaction, TransactionStatus, TransactionType, UnknownPaymentMethod,
};
pub use user::User;
