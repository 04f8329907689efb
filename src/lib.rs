//! 現場サービスERPの在庫・在庫元帳サブシステム
//!
//! - `domain`: 品目・在庫・元帳・調達依頼のモデルと出力ポート
//! - `application`: 在庫サービス（振替、払出し、入荷、返品）と照会サービス
//! - `adapter`: MySQL/インメモリのストア、通知、テナントガード、REST API

pub mod adapter;
pub mod application;
pub mod domain;
