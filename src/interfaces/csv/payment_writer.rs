use crate::domain::payment::PaymentRecord;
use crate::error::Result;
use std::io::Write;

const HEADERS: [&str; 10] = [
    "id",
    "payer_id",
    "subject_id",
    "phone",
    "amount",
    "status",
    "checkout_request_id",
    "created_at",
    "resolved_at",
    "resolved_by",
];

/// Writes payment records as CSV for audit export.
///
/// The header row is written even when there are no records.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(sink);
        Self { writer }
    }

    pub fn write_payments<I>(&mut self, payments: I) -> Result<()>
    where
        I: IntoIterator<Item = PaymentRecord>,
    {
        self.writer.write_record(HEADERS)?;
        for payment in payments {
            self.writer.serialize(payment)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
