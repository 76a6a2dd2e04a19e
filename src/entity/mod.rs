pub mod affiliate;
pub mod click;
pub mod referral;
