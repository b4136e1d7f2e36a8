use crate::domain::payment::AccountPayment;
use crate::error::InputError;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct StatementRecord<'a> {
    id: i64,
    time: String,
    from: &'a str,
    to: &'a str,
    amount: String,
    currency: &'a str,
    outgoing: bool,
}

/// Writes an account statement as CSV with header
/// `id,time,from,to,amount,currency,outgoing`.
pub struct StatementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every entry in the given order and flushes the sink.
    pub fn write_statement<I>(&mut self, entries: I) -> Result<(), InputError>
    where
        I: IntoIterator<Item = AccountPayment>,
    {
        let mut wrote_any = false;
        for entry in entries {
            let payment = &entry.payment;
            self.writer.serialize(StatementRecord {
                id: payment.id.0,
                time: payment.time.to_rfc3339(),
                from: payment.from.as_str(),
                to: payment.to.as_str(),
                amount: payment.amount.to_string(),
                currency: payment.currency.as_str(),
                outgoing: entry.outgoing,
            })?;
            wrote_any = true;
        }
        if !wrote_any {
            // Serialize only emits the header with the first record.
            self.writer
                .write_record(["id", "time", "from", "to", "amount", "currency", "outgoing"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
