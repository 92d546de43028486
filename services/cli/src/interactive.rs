use lead_agent::workflows::leads::{
    ContactChannel, ContactGateway, CrmSync, EoiPayload, Lead, LeadAttributes, LeadFilter,
    LeadId, LeadLifecycleController, LeadReporter, LeadStatus, LeadStore, LifecycleError,
    Operation, TransferDestination,
};
use std::io::{self, BufRead, Write};

const MENU: &str = "\
Lead Agent
  1. Generate lead
  2. Qualify lead
  3. Send outbound contact
  4. Process EOI
  5. Transfer lead
  6. Generate report
  7. Exit";

/// Menu loop over any line source. Operation failures are printed and the loop continues;
/// only I/O errors on the terminal end it early.
pub(crate) struct Session<'a, S, C, M, R, W> {
    controller: &'a LeadLifecycleController<S, C, M>,
    input: R,
    output: W,
    last_lead: Option<LeadId>,
}

impl<'a, S, C, M, R, W> Session<'a, S, C, M, R, W>
where
    S: LeadStore + 'static,
    C: ContactGateway + 'static,
    M: CrmSync + 'static,
    R: BufRead,
    W: Write,
{
    pub(crate) fn new(controller: &'a LeadLifecycleController<S, C, M>, input: R, output: W) -> Self {
        Self {
            controller,
            input,
            output,
            last_lead: None,
        }
    }

    pub(crate) fn run(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.output, "\n{MENU}")?;
            let Some(choice) = self.prompt("Select an option: ")? else {
                break;
            };

            match choice.as_str() {
                "1" => self.generate()?,
                "2" => self.qualify()?,
                "3" => self.contact()?,
                "4" => self.eoi()?,
                "5" => self.transfer()?,
                "6" => self.report()?,
                "7" | "q" | "exit" => break,
                other => writeln!(self.output, "Unknown option '{other}'. Choose 1-7.")?,
            }
        }
        writeln!(self.output, "Goodbye.")
    }

    fn generate(&mut self) -> io::Result<()> {
        let Some(raw) = self.prompt("Attributes (key=value, comma separated): ")? else {
            return Ok(());
        };
        let attributes = match parse_attributes(&raw) {
            Ok(attributes) => attributes,
            Err(reason) => {
                return writeln!(self.output, "{} failed: {reason}", Operation::GenerateLead)
            }
        };
        let result = self.controller.generate_lead(attributes);
        self.show(Operation::GenerateLead, result)
    }

    fn qualify(&mut self) -> io::Result<()> {
        let Some(id) = self.lead_id()? else {
            return Ok(());
        };
        let result = self.controller.qualify_lead(&id);
        self.show(Operation::QualifyLead, result)
    }

    fn contact(&mut self) -> io::Result<()> {
        let Some(id) = self.lead_id()? else {
            return Ok(());
        };
        let channel = self.prompt("Channel (email/sms) [email]: ")?.unwrap_or_default();
        let channel = if channel.is_empty() {
            ContactChannel::Email
        } else {
            match channel.parse::<ContactChannel>() {
                Ok(channel) => channel,
                Err(err) => {
                    return writeln!(self.output, "{} failed: {err}", Operation::SendOutboundContact)
                }
            }
        };
        let template = self.prompt("Template: ")?.unwrap_or_default();
        let result = self.controller.send_outbound_contact(&id, channel, &template);
        self.show(Operation::SendOutboundContact, result)
    }

    fn eoi(&mut self) -> io::Result<()> {
        let Some(id) = self.lead_id()? else {
            return Ok(());
        };
        let product_interest = self.prompt("Product interest: ")?.unwrap_or_default();
        let budget_range = self.optional("Budget range (optional): ")?;
        let notes = self.optional("Notes (optional): ")?;
        let payload = EoiPayload {
            product_interest,
            budget_range,
            notes,
        };
        let result = self.controller.process_eoi(&id, payload);
        self.show(Operation::ProcessEoi, result)
    }

    fn transfer(&mut self) -> io::Result<()> {
        let Some(id) = self.lead_id()? else {
            return Ok(());
        };
        let team = self.prompt("Destination team: ")?.unwrap_or_default();
        let available = self
            .prompt("Sales team available now? (y/n): ")?
            .map(|answer| matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false);
        let destination = TransferDestination {
            team,
            sales_team_available: available,
        };
        let result = self.controller.transfer_lead(&id, destination);
        self.show(Operation::TransferLead, result)
    }

    fn report(&mut self) -> io::Result<()> {
        let status = self.prompt("Status filter (blank for all): ")?.unwrap_or_default();
        let filter = if status.is_empty() {
            LeadFilter::all()
        } else {
            match status.parse::<LeadStatus>() {
                Ok(status) => LeadFilter::with_status(status),
                Err(err) => return writeln!(self.output, "generate report failed: {err}"),
            }
        };

        match LeadReporter::new(self.controller.store().clone()).report(&filter) {
            Ok(report) => {
                let rendered = serde_json::to_string_pretty(&report).map_err(io::Error::from)?;
                writeln!(self.output, "{rendered}")
            }
            Err(err) => writeln!(self.output, "generate report failed: {err}"),
        }
    }

    /// Blank input reuses the lead handled last in this session.
    fn lead_id(&mut self) -> io::Result<Option<LeadId>> {
        let label = match &self.last_lead {
            Some(last) => format!("Lead id [{last}]: "),
            None => "Lead id: ".to_string(),
        };
        let Some(raw) = self.prompt(&label)? else {
            return Ok(None);
        };
        if raw.is_empty() {
            if self.last_lead.is_none() {
                writeln!(self.output, "A lead id is required.")?;
            }
            return Ok(self.last_lead.clone());
        }
        Ok(Some(LeadId(raw)))
    }

    fn optional(&mut self, label: &str) -> io::Result<Option<String>> {
        Ok(self.prompt(label)?.filter(|value| !value.is_empty()))
    }

    /// `None` once the input is exhausted.
    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn show(&mut self, operation: Operation, result: Result<Lead, LifecycleError>) -> io::Result<()> {
        match result {
            Ok(lead) => {
                self.last_lead = Some(lead.id().clone());
                writeln!(self.output, "{}", describe(&lead))
            }
            Err(err) => writeln!(self.output, "{operation} failed: {err}"),
        }
    }
}

pub(crate) fn describe(lead: &Lead) -> String {
    let view = lead.status_view();
    let mut line = format!("Lead {} is {}", view.lead_id, view.status);
    if let (Some(score), Some(tier)) = (view.score, view.tier) {
        line.push_str(&format!(" (score {score:.2}, {tier})"));
    }
    if let Some(crm_ref) = &view.crm_ref {
        line.push_str(&format!(" [crm {crm_ref}]"));
    }
    if !view.last_note.is_empty() {
        line.push_str(&format!(": {}", view.last_note));
    }
    line
}

fn parse_attributes(raw: &str) -> Result<LeadAttributes, String> {
    let mut attributes = LeadAttributes::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("'{entry}' should look like key=value"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("'{entry}' has no attribute name"));
        }
        attributes.insert_input(name, value.trim());
    }
    Ok(attributes)
}
